//! IPv4 CIDR blocks.
//!
//! # Responsibilities
//! - Parse `a.b.c.d/len` entries from the mapping file
//! - Test address containment with a bitwise mask
//!
//! # Design Decisions
//! - Host bits in the configured address are accepted and cleared
//!   (`10.0.0.5/24` is the block `10.0.0.0/24`)
//! - Network and broadcast addresses are both inside the block
//! - A bare address without `/len` is malformed, never an implicit `/32`

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use thiserror::Error;

/// A CIDR entry that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed CIDR block {entry:?}: {reason}")]
pub struct SubnetFormatError {
    /// The offending entry as written in the source.
    pub entry: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// An IPv4 network expressed as address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrBlock {
    network: u32,
    mask: u32,
    prefix_len: u8,
}

impl CidrBlock {
    /// Build a block from an address and prefix length.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, SubnetFormatError> {
        let net = Ipv4Net::new(addr, prefix_len).map_err(|_| SubnetFormatError {
            entry: format!("{}/{}", addr, prefix_len),
            reason: "prefix length must be between 0 and 32",
        })?;
        Ok(Self::from_net(net))
    }

    fn from_net(net: Ipv4Net) -> Self {
        let mask = u32::from(net.netmask());
        Self {
            network: u32::from(net.addr()) & mask,
            mask,
            prefix_len: net.prefix_len(),
        }
    }

    /// Returns true if `ip` lies between the network and broadcast address.
    #[inline]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask == self.network
    }

    /// First address of the block.
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    /// Last address of the block.
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network | !self.mask)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl FromStr for CidrBlock {
    type Err = SubnetFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| SubnetFormatError {
            entry: s.to_string(),
            reason,
        };

        if s.is_empty() {
            return Err(malformed("empty entry"));
        }
        if !s.contains('/') {
            return Err(malformed("missing prefix length"));
        }

        s.parse::<Ipv4Net>()
            .map(Self::from_net)
            .map_err(|_| malformed("expected an IPv4 address followed by /0-32"))
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> CidrBlock {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn contains_host_inside_block() {
        assert!(block("10.0.0.0/24").contains(ip("10.0.0.5")));
        assert!(!block("10.0.0.0/24").contains(ip("10.0.1.5")));
    }

    #[test]
    fn network_and_broadcast_are_inclusive() {
        let b = block("192.168.4.0/22");
        assert_eq!(b.network(), ip("192.168.4.0"));
        assert_eq!(b.broadcast(), ip("192.168.7.255"));
        assert!(b.contains(ip("192.168.4.0")));
        assert!(b.contains(ip("192.168.7.255")));
        assert!(!b.contains(ip("192.168.8.0")));
        assert!(!b.contains(ip("192.168.3.255")));
    }

    #[test]
    fn host_bits_are_cleared() {
        let b = block("10.0.0.5/24");
        assert_eq!(b.network(), ip("10.0.0.0"));
        assert_eq!(b.to_string(), "10.0.0.0/24");
        assert!(b.contains(ip("10.0.0.200")));
    }

    #[test]
    fn zero_prefix_matches_everything() {
        let b = block("0.0.0.0/0");
        assert!(b.contains(ip("8.8.8.8")));
        assert!(b.contains(ip("255.255.255.255")));
        assert_eq!(b.broadcast(), ip("255.255.255.255"));
    }

    #[test]
    fn full_prefix_matches_single_host() {
        let b = block("203.0.113.9/32");
        assert!(b.contains(ip("203.0.113.9")));
        assert!(!b.contains(ip("203.0.113.10")));
    }

    #[test]
    fn rejects_malformed_entries() {
        for bad in ["", "10.0.0.0", "10.0.0.0/33", "10.0.0/8", "10.0.0.0/", "fe80::/10", " 10.0.0.0/8", "abc/8"] {
            let err = bad.parse::<CidrBlock>().unwrap_err();
            assert_eq!(err.entry, bad);
        }
    }

    #[test]
    fn new_rejects_long_prefix() {
        assert!(CidrBlock::new(ip("10.0.0.0"), 33).is_err());
        assert_eq!(CidrBlock::new(ip("10.1.2.3"), 8).unwrap().to_string(), "10.0.0.0/8");
    }
}
