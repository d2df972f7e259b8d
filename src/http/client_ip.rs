//! Client IP resolution.
//!
//! # Responsibilities
//! - Pick one candidate address from the forwarding chain or the peer
//! - Validate it as IPv4
//!
//! # Strategies
//! - `FirstForwarded`: leftmost `X-Forwarded-For` entry, else the peer.
//!   Any client can forge this header; use only behind a proxy that
//!   overwrites it.
//! - `TrustedProxies`: walk `[forwarded..., peer]` right to left and take the
//!   first hop outside the trusted CIDRs
//! - `PeerOnly`: ignore forwarding headers entirely

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::{HeaderMap, HeaderName};
use ipnet::Ipv4Net;
use thiserror::Error;

use crate::config::schema::{ClientIpConfig, ClientIpStrategy};

/// Why no client address could be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The candidate is not a well-formed IP address.
    #[error("invalid client address {candidate:?}")]
    Invalid { candidate: String },

    /// The candidate is a valid address but not IPv4.
    #[error("unsupported client address {addr}: only IPv4 is mapped")]
    Unsupported { addr: IpAddr },

    /// Neither a forwarding header nor a peer address was available.
    #[error("no client address available")]
    Missing,
}

/// How the forwarding chain is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardedPolicy {
    FirstForwarded,
    TrustedProxies(Vec<Ipv4Net>),
    PeerOnly,
}

/// Derives the client address for one request.
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    forwarded_header: HeaderName,
    policy: ForwardedPolicy,
}

impl ClientIpResolver {
    pub fn new(forwarded_header: HeaderName, policy: ForwardedPolicy) -> Self {
        Self {
            forwarded_header,
            policy,
        }
    }

    /// Build from the `[mapper.client_ip]` section.
    pub fn from_config(forwarded_header: HeaderName, config: &ClientIpConfig) -> Self {
        let policy = match config.strategy {
            ClientIpStrategy::FirstForwarded => ForwardedPolicy::FirstForwarded,
            ClientIpStrategy::TrustedProxies => {
                ForwardedPolicy::TrustedProxies(config.trusted_proxies.clone())
            }
            ClientIpStrategy::PeerOnly => ForwardedPolicy::PeerOnly,
        };
        Self::new(forwarded_header, policy)
    }

    pub fn forwarded_header(&self) -> &HeaderName {
        &self.forwarded_header
    }

    /// Resolve the client address from request headers and the peer address.
    pub fn resolve(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> Result<Ipv4Addr, ResolveError> {
        let peer_ip = peer.map(|addr| addr.ip());

        match &self.policy {
            ForwardedPolicy::PeerOnly => peer_ip.ok_or(ResolveError::Missing).and_then(to_ipv4),
            ForwardedPolicy::FirstForwarded => match self.forwarded_chain(headers)? {
                Some(chain) => {
                    // `split` always yields at least one item.
                    let first = chain.split(',').next().unwrap_or_default().trim();
                    parse_candidate(first)
                }
                None => peer_ip.ok_or(ResolveError::Missing).and_then(to_ipv4),
            },
            ForwardedPolicy::TrustedProxies(trusted) => {
                let peer = match peer_ip {
                    Some(ip) => Some(to_ipv4(ip)?),
                    None => None,
                };
                if let Some(peer) = peer {
                    if !is_trusted(trusted, peer) {
                        return Ok(peer);
                    }
                }

                let hops = match self.forwarded_chain(headers)? {
                    Some(chain) => chain
                        .split(',')
                        .map(|entry| parse_candidate(entry.trim()))
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                };

                if let Some(client) = hops.iter().rev().find(|ip| !is_trusted(trusted, **ip)) {
                    return Ok(*client);
                }
                // Every hop is a trusted proxy: the leftmost is the best we know.
                hops.first().copied().or(peer).ok_or(ResolveError::Missing)
            }
        }
    }

    /// Every field line of the forwarded header, in order, as one
    /// comma-separated chain. Proxies may append a line instead of extending
    /// the first one.
    fn forwarded_chain(&self, headers: &HeaderMap) -> Result<Option<String>, ResolveError> {
        let mut chain: Option<String> = None;
        for value in headers.get_all(&self.forwarded_header) {
            let line = value.to_str().map_err(|_| ResolveError::Invalid {
                candidate: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })?;
            match chain.as_mut() {
                Some(joined) => {
                    joined.push(',');
                    joined.push_str(line);
                }
                None => chain = Some(line.to_string()),
            }
        }
        Ok(chain)
    }
}

fn is_trusted(trusted: &[Ipv4Net], ip: Ipv4Addr) -> bool {
    trusted.iter().any(|net| net.contains(&ip))
}

fn parse_candidate(candidate: &str) -> Result<Ipv4Addr, ResolveError> {
    candidate
        .parse::<IpAddr>()
        .map_err(|_| ResolveError::Invalid {
            candidate: candidate.to_string(),
        })
        .and_then(to_ipv4)
}

fn to_ipv4(ip: IpAddr) -> Result<Ipv4Addr, ResolveError> {
    match ip {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .ok_or(ResolveError::Unsupported { addr: ip }),
    }
}
