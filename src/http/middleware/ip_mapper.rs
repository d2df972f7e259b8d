//! IP Mapping Middleware.
//! Annotates requests with network labels, then always continues the chain.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::filter::IpMapper;
use crate::mapping::ConfigError;

pub async fn ip_mapper_middleware(
    State(mapper): State<Arc<IpMapper>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    // 1. Obtain rules. Per-request reads touch the disk, so keep them off the
    //    async workers.
    let store = mapper.store().clone();
    let table = if store.reads_per_request() {
        tokio::task::spawn_blocking(move || store.current())
            .await
            .unwrap_or_else(|e| Err(ConfigError::Unavailable(format!("mapping load task failed: {e}"))))
    } else {
        store.current()
    };

    // 2. Resolve, strip, match, inject.
    let outcome = mapper.apply(req.headers_mut(), peer, table);
    tracing::trace!(outcome = outcome.as_str(), "IP mapping evaluated");

    // 3. Whatever happened, hand the request on.
    next.run(req).await
}
