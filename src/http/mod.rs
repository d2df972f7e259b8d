//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, ConnectInfo for the peer address)
//!     → request.rs (add request ID)
//!     → middleware/ip_mapper.rs (resolve client, strip + inject label header)
//!     → server.rs forward handler → upstream service
//! ```

pub mod client_ip;
pub mod middleware;
pub mod request;
pub mod server;

pub use client_ip::{ClientIpResolver, ForwardedPolicy, ResolveError};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
