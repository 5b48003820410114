mod common;

use std::{sync::Arc, time::Duration};

use cluster::{ClientBuilder, Error};
use serde_json::json;
use tokio::time::{sleep, Instant};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::{closed_url, node, nodes_info, sniffable_node};

fn five_nodes() -> serde_json::Value {
    nodes_info(&[
        ("n1", "127.0.0.1:1"),
        ("n2", "127.0.0.1:2"),
        ("n3", "127.0.0.1:3"),
        ("n4", "127.0.0.1:4"),
        ("n5", "127.0.0.1:5"),
    ])
}

async fn slow_node(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_nodes/http"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(nodes_info(&[("slow", "127.0.0.1:6")]))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

fn sorted_ids(client: &cluster::Client) -> Vec<String> {
    let mut ids: Vec<String> = client
        .connections()
        .iter()
        .map(|c| c.identity().to_owned())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn first_answer_wins_over_slow_seed() {
    let topology = five_nodes();
    let a = sniffable_node(&topology).await;
    let b = sniffable_node(&topology).await;
    let slow = slow_node(Duration::from_secs(5)).await;

    let started = Instant::now();
    let client = ClientBuilder::new()
        .urls([a.uri(), b.uri(), slow.uri()])
        .healthcheck(false)
        .sniffer_timeout_startup(Duration::from_secs(1))
        .build()
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(sorted_ids(&client), vec!["n1", "n2", "n3", "n4", "n5"]);
    assert!(client
        .connections()
        .iter()
        .all(|c| c.url() != slow.uri() && c.url() != a.uri()));
    client.stop().await;
}

#[tokio::test]
async fn sniff_timeout_fails_construction() {
    let slow = slow_node(Duration::from_secs(3)).await;
    let started = Instant::now();
    let err = ClientBuilder::new()
        .urls([slow.uri()])
        .healthcheck(false)
        .sniffer_timeout_startup(Duration::from_millis(300))
        .build()
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Construction(_)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn no_answer_fails_before_deadline() {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_nodes/http"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    let empty = sniffable_node(&json!({"nodes": {}})).await;

    let started = Instant::now();
    let err = ClientBuilder::new()
        .urls([broken.uri(), empty.uri(), closed_url()])
        .healthcheck(false)
        .sniffer_timeout_startup(Duration::from_secs(3))
        .build()
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("no node found"), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn callback_and_address_forms() {
    let topology = json!({
        "nodes": {
            "master": node("master", "127.0.0.1:1", &["master"]),
            "data": node("data", "127.0.0.1:2", &["data"]),
            "ingest": node("ingest", "127.0.0.1:3", &["data", "ingest"]),
            "legacy": node("legacy", "inet[/127.0.0.1:7]", &["data"]),
            "no-port": node("no-port", "localhost", &["data"]),
            "no-http": {"name": "es-no-http", "roles": ["data"]},
        }
    });
    let seed = sniffable_node(&topology).await;

    let client = ClientBuilder::new()
        .urls([seed.uri()])
        .scheme("https")
        .healthcheck(false)
        .sniffer_callback(|node| node.is_data())
        .build()
        .await
        .unwrap();

    assert_eq!(sorted_ids(&client), vec!["data", "ingest", "legacy"]);
    let legacy = client
        .connections()
        .into_iter()
        .find(|c| c.identity() == "legacy")
        .unwrap();
    assert_eq!(legacy.url(), "https://127.0.0.1:7");
    client.stop().await;
}

#[tokio::test]
async fn resniff_keeps_known_connections() {
    let seed = sniffable_node(&nodes_info(&[
        ("n1", "127.0.0.1:1"),
        ("n2", "127.0.0.1:2"),
        ("n3", "127.0.0.1:3"),
    ]))
    .await;
    let client = ClientBuilder::new()
        .urls([seed.uri()])
        .healthcheck(false)
        .build()
        .await
        .unwrap();

    let n2 = client
        .connections()
        .into_iter()
        .find(|c| c.identity() == "n2")
        .unwrap();
    n2.mark_as_dead();

    Mock::given(method("GET"))
        .and(path("/_nodes/http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes_info(&[
            ("n2", "127.0.0.1:2"),
            ("n3", "127.0.0.1:3"),
            ("n4", "127.0.0.1:4"),
        ])))
        .with_priority(1)
        .mount(&seed)
        .await;
    client.sniff(Duration::from_secs(1)).await.unwrap();

    assert_eq!(sorted_ids(&client), vec!["n2", "n3", "n4"]);
    let after = client
        .connections()
        .into_iter()
        .find(|c| c.identity() == "n2")
        .unwrap();
    assert!(Arc::ptr_eq(&n2, &after));
    assert!(after.is_dead());
    client.stop().await;
}

#[tokio::test]
async fn background_sniffer_follows_membership() {
    let seed = sniffable_node(&nodes_info(&[("n1", "127.0.0.1:1")])).await;
    let client = ClientBuilder::new()
        .urls([seed.uri()])
        .healthcheck(false)
        .sniffer_interval(Duration::from_millis(150))
        .build()
        .await
        .unwrap();
    assert_eq!(sorted_ids(&client), vec!["n1"]);

    Mock::given(method("GET"))
        .and(path("/_nodes/http"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes_info(&[
            ("n1", "127.0.0.1:1"),
            ("n2", "127.0.0.1:2"),
        ])))
        .with_priority(1)
        .mount(&seed)
        .await;
    sleep(Duration::from_millis(600)).await;

    assert_eq!(sorted_ids(&client), vec!["n1", "n2"]);
    client.stop().await;
}

#[tokio::test]
async fn disabled_sniffing_keeps_seeds() {
    let seed = sniffable_node(&five_nodes()).await;
    let client = ClientBuilder::new()
        .urls([seed.uri()])
        .sniff(false)
        .healthcheck(false)
        .build()
        .await
        .unwrap();
    client.sniff(Duration::from_secs(1)).await.unwrap();

    let conns = client.connections();
    assert_eq!(conns.len(), 1);
    assert_eq!(conns[0].url(), seed.uri());
    assert!(conns[0].node_id().is_none());
    assert!(seed.received_requests().await.unwrap().is_empty());
    client.stop().await;
}
