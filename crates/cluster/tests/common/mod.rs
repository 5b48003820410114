#![allow(dead_code)]

use std::net::TcpListener;

use serde_json::{json, Map, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Url of a local port nobody listens on.
pub fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// `/_nodes/http` body with the given `(node id, publish address)`, all
/// nodes are master eligible data nodes.
pub fn nodes_info(nodes: &[(&str, &str)]) -> Value {
    let mut map = Map::new();
    for (id, address) in nodes {
        map.insert(id.to_string(), node(id, address, &["master", "data"]));
    }
    json!({"cluster_name": "search", "nodes": map})
}

pub fn node(id: &str, address: &str, roles: &[&str]) -> Value {
    json!({
        "name": format!("es-{}", id),
        "roles": roles,
        "http": {"publish_address": address, "bound_address": [address]},
    })
}

/// A node answering nodes info with `body`.
pub async fn sniffable_node(body: &Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_nodes/http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// A node answering health probes with `status`.
pub async fn node_with_health(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

pub async fn head_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "HEAD")
        .count()
}

/// A node listing only itself in nodes info and answering health probes
/// with `health`.
pub async fn self_sniffing_node(id: &str, health: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    let address = server.address().to_string();
    Mock::given(method("GET"))
        .and(path("/_nodes/http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes_info(&[(id, address.as_str())])))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(health)
        .mount(&server)
        .await;
    server
}
