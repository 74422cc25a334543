//! Integration test: signed webhook POSTs end to end against a mocked
//! platform API. Covers the echo round trip and signature rejection.

use base64::Engine;
use hmac::{Hmac, Mac};
use httpmock::prelude::*;
use lib::config::Config;
use lib::gateway;
use std::time::Duration;

type HmacSha256 = Hmac<sha2::Sha256>;

const CHANNEL_SECRET: &str = "testsecret";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn sign(body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(CHANNEL_SECRET.as_bytes()).expect("hmac key");
    mac.update(body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Spawn a gateway bound to a free loopback port; returns the port.
fn spawn_gateway(api_base: String) -> u16 {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.channels.line.channel_secret = Some(CHANNEL_SECRET.to_string());
    config.channels.line.channel_access_token = Some("test-token".to_string());
    config.channels.line.api_base = Some(api_base);
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });
    port
}

async fn wait_until_up(client: &reqwest::Client, port: u16) {
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..100 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on port {} did not come up within 5s", port);
}

#[tokio::test]
async fn signed_echo_round_trip_hits_the_reply_endpoint() {
    let line_api = MockServer::start_async().await;
    let reply_mock = line_api
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .header("authorization", "Bearer test-token")
                .json_body_partial(
                    r#"{"replyToken":"rt-echo","messages":[{"type":"text","text":"ping"}]}"#,
                );
            then.status(200).json_body(serde_json::json!({}));
        })
        .await;

    let port = spawn_gateway(line_api.base_url());
    let client = reqwest::Client::new();
    wait_until_up(&client, port).await;

    let body = r#"{"destination":"Ubot","events":[{"type":"message","replyToken":"rt-echo","source":{"type":"user","userId":"U1"},"message":{"type":"text","id":"1","text":"ping"}}]}"#;
    let res = client
        .post(format!("http://127.0.0.1:{}/line/webhook", port))
        .header("X-Line-Signature", sign(body))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("post webhook");
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    // The reply is sent from the processor task after the webhook returns.
    for _ in 0..100 {
        if reply_mock.hits_async().await >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    reply_mock.assert_async().await;
}

#[tokio::test]
async fn webhook_rejects_missing_or_bad_signatures() {
    let line_api = MockServer::start_async().await;
    let reply_mock = line_api
        .mock_async(|when, then| {
            when.method(POST).path("/v2/bot/message/reply");
            then.status(200).json_body(serde_json::json!({}));
        })
        .await;

    let port = spawn_gateway(line_api.base_url());
    let client = reqwest::Client::new();
    wait_until_up(&client, port).await;

    let body = r#"{"events":[{"type":"message","replyToken":"rt-x","source":{"type":"user","userId":"U1"},"message":{"type":"text","id":"1","text":"ping"}}]}"#;
    let url = format!("http://127.0.0.1:{}/line/webhook", port);

    let res = client
        .post(&url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("post without signature");
    assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);

    let res = client
        .post(&url)
        .header("X-Line-Signature", sign("a different body"))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("post with wrong signature");
    assert_eq!(res.status(), reqwest::StatusCode::FORBIDDEN);

    // Nothing reached the platform API.
    assert_eq!(reply_mock.hits_async().await, 0);
}

#[tokio::test]
async fn malformed_envelopes_are_bad_requests() {
    let line_api = MockServer::start_async().await;
    let port = spawn_gateway(line_api.base_url());
    let client = reqwest::Client::new();
    wait_until_up(&client, port).await;

    let body = r#"{"events": "not an array"}"#;
    let res = client
        .post(format!("http://127.0.0.1:{}/line/webhook", port))
        .header("X-Line-Signature", sign(body))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("post malformed body");
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
}
