//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (strip client-sent label header)
//!     → [matching]
//!     → headers.rs (write computed labels)
//! ```
//!
//! # Design Decisions
//! - No trust in client input: the label header is only ever written by us
//! - Fail open: errors pass the request through unannotated, never blocked

pub mod headers;

pub use headers::HeaderPolicy;
