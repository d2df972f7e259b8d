//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::HeaderMap, Json, Router};
use ip_mapper::config::MapperConfig;
use ip_mapper::lifecycle::startup::build_store;
use ip_mapper::{HttpServer, IpMapper, Shutdown};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;

pub const LABEL_HEADER: &str = "x-network-labels";

/// Start an upstream that answers every request with its headers as JSON.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(echo_headers);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let map: Map<String, Value> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                Value::String(v.to_str().unwrap_or_default().to_string()),
            )
        })
        .collect();
    Json(Value::Object(map))
}

/// Start the proxy on an ephemeral port in front of `upstream`.
pub async fn start_proxy(mut config: MapperConfig, upstream: SocketAddr) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();
    config.upstream.address = upstream.to_string();

    let shutdown = Shutdown::new();
    let (store, watcher) = build_store(&config.mapper, &shutdown);
    let mapper = IpMapper::from_config(&config.mapper, store).unwrap();
    let server = HttpServer::new(config, Arc::new(mapper)).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _watcher = watcher;
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn mapping_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn config_for(mapping: &std::path::Path) -> MapperConfig {
    let mut config = MapperConfig::default();
    config.mapper.mapping_file = mapping.to_string_lossy().into_owned();
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Send a GET through the proxy and return the headers the upstream saw.
pub async fn upstream_headers(proxy: SocketAddr, headers: &[(&str, &str)]) -> Value {
    let mut req = client().get(format!("http://{}/resource?id=7", proxy));
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    let res = req.send().await.expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    res.json().await.unwrap()
}
