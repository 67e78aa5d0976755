use crate::context::Context;
use crate::protocol::fallback::fallback_protocol;
use crate::protocol::DailyProtocol;
use crate::storage::ChatMessage;
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

/// Canned reply when the gateway cannot be reached or errors out. The user
/// still gets an answer; the failure only shows up in logs.
pub const CHAT_APOLOGY: &str =
    "Sorry, I couldn't reach the assistant right now. Please try again in a moment.";

const CLIENT_TIMEOUT_SECS: u64 = 60;

/// What a protocol request produced: either the gateway's reply or the local
/// fallback document. A capability reply is passed through untouched since it
/// is not a protocol document.
#[derive(Debug, Clone)]
pub enum ProtocolOutcome {
    Protocol(DailyProtocol),
    Capability(Value),
}

impl ProtocolOutcome {
    pub fn as_protocol(&self) -> Option<&DailyProtocol> {
        match self {
            Self::Protocol(doc) => Some(doc),
            Self::Capability(_) => None,
        }
    }
}

/// HTTP client for the gateway. Every remote failure degrades to a local
/// answer: the fallback protocol for /protocol, a canned apology for /chat.
pub struct CopilotClient {
    base_url: String,
    client: reqwest::Client,
}

impl CopilotClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Request today's protocol. Transport errors, non-2xx statuses and
    /// unparseable bodies all resolve to the deterministic local fallback.
    pub async fn request_protocol(&self, ctx: &Context) -> ProtocolOutcome {
        match self.try_remote_protocol(ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("protocol request failed, using local fallback: {e}");
                ProtocolOutcome::Protocol(fallback_protocol(ctx))
            }
        }
    }

    async fn try_remote_protocol(&self, ctx: &Context) -> anyhow::Result<ProtocolOutcome> {
        let response = self
            .client
            .post(format!("{}/protocol", self.base_url))
            .json(ctx)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("gateway returned {status}");
        }

        let value: Value = response.json().await?;
        match DailyProtocol::from_value(value.clone()) {
            Ok(doc) => {
                doc.validate()?;
                Ok(ProtocolOutcome::Protocol(doc))
            }
            Err(_) => Ok(ProtocolOutcome::Capability(value)),
        }
    }

    /// One chat turn. Failures resolve to the canned apology.
    pub async fn chat(&self, messages: &[ChatMessage], ctx: &Context) -> String {
        match self.try_remote_chat(messages, ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("chat request failed: {e}");
                CHAT_APOLOGY.to_string()
            }
        }
    }

    async fn try_remote_chat(
        &self,
        messages: &[ChatMessage],
        ctx: &Context,
    ) -> anyhow::Result<String> {
        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&serde_json::json!({ "messages": messages, "context": ctx }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("gateway returned {status}");
        }

        let value: Value = response.json().await?;
        value["reply"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("chat response had no reply field"))
    }

    /// Streaming chat turn. Each yielded item is the reply accumulated so far,
    /// so a UI can re-render the whole message on every chunk. Errors mid-way
    /// finish the stream with the apology appended.
    pub fn chat_stream<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        ctx: &'a Context,
    ) -> Pin<Box<dyn Stream<Item = String> + Send + 'a>> {
        Box::pin(stream! {
            let response = self
                .client
                .post(format!("{}/chat?stream=true", self.base_url))
                .json(&serde_json::json!({ "messages": messages, "context": ctx }))
                .send()
                .await;

            let response = match response {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    tracing::warn!("chat stream request failed: gateway returned {}", r.status());
                    yield CHAT_APOLOGY.to_string();
                    return;
                }
                Err(e) => {
                    tracing::warn!("chat stream request failed: {e}");
                    yield CHAT_APOLOGY.to_string();
                    return;
                }
            };

            let mut buffer = String::new();
            let mut bytes = response.bytes_stream();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        yield buffer.clone();
                    }
                    Err(e) => {
                        tracing::warn!("chat stream interrupted: {e}");
                        if !buffer.is_empty() {
                            buffer.push('\n');
                        }
                        buffer.push_str(CHAT_APOLOGY);
                        yield buffer;
                        return;
                    }
                }
            }
        })
    }
}
