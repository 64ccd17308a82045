//! Full gateway over a real socket.

use std::time::Duration;

mod common;
use common::*;

#[tokio::test]
async fn test_serves_and_shuts_down() {
    let (addr, shutdown, task) = start_gateway(secured_config()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://{addr}/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));

    let res = client
        .get(format!("http://{addr}/roles"))
        .basic_auth("alice", Some("secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["principal"], "alice");

    let res = client
        .get(format!("http://{addr}/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
