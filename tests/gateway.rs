//! Gateway transport semantics over a real listener: CORS, method handling,
//! status codes and both chat response modes.

use chilib::config::Config;
use chilib::context::Context;
use chilib::error::CopilotError;
use chilib::gateway::run_gateway_with_listener;
use chilib::protocol::fallback::fallback_protocol_for_date;
use chilib::providers::{Provider, ServiceReply};
use chilib::storage::ChatMessage;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;

struct StubProvider;

impl Provider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate_protocol<'a>(
        &'a self,
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceReply, CopilotError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(ServiceReply::Protocol(fallback_protocol_for_date(
                ctx,
                "2026-08-25",
            )))
        })
    }

    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        _ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move { Ok(format!("stub reply to {} messages", messages.len())) })
    }
}

fn configured() -> Config {
    let mut config = Config::default();
    config.api_key = Some("sk-test".into());
    config.bridge.server_url = Some("https://mcp.zapier.com/api/mcp/mcp".into());
    config.bridge.api_key = Some("bridge-secret".into());
    config
}

async fn spawn_gateway(config: Config) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run_gateway_with_listener(
        listener,
        Arc::new(config),
        Arc::new(StubProvider),
    ));
    format!("http://{addr}")
}

#[tokio::test]
async fn preflight_returns_204_with_cors_headers() {
    let base = spawn_gateway(configured()).await;
    let client = reqwest::Client::new();

    for endpoint in ["/protocol", "/chat"] {
        let response = client
            .request(reqwest::Method::OPTIONS, format!("{base}{endpoint}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204, "for {endpoint}");
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(
            headers["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
    }
}

#[tokio::test]
async fn wrong_method_is_405() {
    let base = spawn_gateway(configured()).await;
    let response = reqwest::get(format!("{base}/protocol")).await.unwrap();
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let base = spawn_gateway(configured()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/protocol"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));
}

#[tokio::test]
async fn missing_credentials_fail_before_any_model_call() {
    let base = spawn_gateway(Config::default()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/protocol"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.unwrap();
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("OPENAI_API_KEY"));
    assert!(error.contains("ZAPIER_MCP_URL"));
    assert!(error.contains("ZAPIER_MCP_KEY"));
}

#[tokio::test]
async fn protocol_round_trip_carries_cors_on_data_responses() {
    let base = spawn_gateway(configured()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/protocol"))
        .json(&json!({"sleepHours": 5, "pantry": ["eggs"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["date"], "2026-08-25");
    assert_eq!(body["blocks"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn chat_returns_a_json_reply() {
    let base = spawn_gateway(configured()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/chat"))
        .json(&json!({
            "messages": [{"type": "user", "text": "hi"}],
            "context": {}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reply"], "stub reply to 1 messages");
}

#[tokio::test]
async fn chat_streams_plain_text_when_asked() {
    let base = spawn_gateway(configured()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/chat?stream=true"))
        .json(&json!({"messages": [], "context": {}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let text = response.text().await.unwrap();
    assert_eq!(text, "stub reply to 0 messages");
}

#[tokio::test]
async fn health_answers_ok() {
    let base = spawn_gateway(configured()).await;
    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}
