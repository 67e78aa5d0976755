use super::envelope::{Extraction, ResponseEnvelope};
use super::traits::{Provider, ServiceReply};
use super::{api_error, sanitize_api_error};
use crate::capabilities::CapabilityRegistry;
use crate::config::Config;
use crate::context::Context;
use crate::error::{CopilotError, ExtractError, ProviderError};
use crate::protocol::{DailyProtocol, schema};
use crate::storage::ChatMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Display name used in error messages; `Provider::name()` stays lowercase.
const PROVIDER_NAME: &str = "OpenAI";

const PROTOCOL_SYSTEM_PROMPT: &str =
    "You are Chili B., a calm, low-friction background wellness copilot. \
     Always return ONLY JSON that matches the provided schema.";

const CHAT_SYSTEM_PROMPT: &str =
    "You are Chili B. — a warm, proactive wellness assistant. You read structured \
     context and respond with short, actionable, supportive advice. Strictly avoid \
     medical diagnosis. If information is missing, ask a short clarifying question. \
     Tone: concise, caring, practical.";

pub struct OpenAiProvider {
    base_url: String,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    client: Client,
    model: String,
    temperature: f64,
    bridge_label: String,
    bridge_url: Option<String>,
    bridge_auth_header: Option<String>,
    capabilities: CapabilityRegistry,
}

// ── Request shapes ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ProtocolRequest<'a> {
    model: &'a str,
    temperature: f64,
    tools: Vec<McpTool<'a>>,
    tool_choice: &'static str,
    functions: Vec<Value>,
    function_call: &'static str,
    text: TextOptions<'a>,
    input: Vec<InputMessage>,
}

#[derive(Debug, Serialize)]
struct McpTool<'a> {
    r#type: &'static str,
    server_label: &'a str,
    server_url: &'a str,
    require_approval: &'static str,
    headers: BridgeHeaders<'a>,
}

#[derive(Debug, Serialize)]
struct BridgeHeaders<'a> {
    #[serde(rename = "Authorization")]
    authorization: &'a str,
}

#[derive(Debug, Serialize)]
struct TextOptions<'a> {
    format: OutputFormat<'a>,
}

#[derive(Debug, Serialize)]
struct OutputFormat<'a> {
    r#type: &'static str,
    name: &'a str,
    strict: bool,
    schema: Value,
}

#[derive(Debug, Serialize)]
struct InputMessage {
    role: &'static str,
    content: String,
}

impl InputMessage {
    fn new(role: &'static str, content: String) -> Self {
        Self { role, content }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<InputMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            cached_auth_header: config.api_key.as_deref().map(|k| format!("Bearer {k}")),
            client: Client::builder()
                .timeout(Duration::from_secs(config.gateway.request_timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_else(|_| Client::new()),
            model: config.model.clone(),
            temperature: config.temperature,
            bridge_label: config.bridge.server_label.clone(),
            bridge_url: config.bridge.server_url.clone(),
            bridge_auth_header: config
                .bridge
                .api_key
                .as_deref()
                .map(|k| format!("Bearer {k}")),
            capabilities: CapabilityRegistry::default(),
        }
    }

    fn auth_header(&self) -> Result<&str, ProviderError> {
        self.cached_auth_header.as_deref().ok_or(ProviderError::Auth {
            provider: PROVIDER_NAME.to_string(),
        })
    }

    fn bridge_tools(&self) -> Vec<McpTool<'_>> {
        match (self.bridge_url.as_deref(), self.bridge_auth_header.as_deref()) {
            (Some(url), Some(auth)) => vec![McpTool {
                r#type: "mcp",
                server_label: &self.bridge_label,
                server_url: url,
                require_approval: "never",
                headers: BridgeHeaders {
                    authorization: auth,
                },
            }],
            _ => Vec::new(),
        }
    }

    fn build_protocol_request<'a>(&'a self, ctx: &Context) -> ProtocolRequest<'a> {
        let context_json =
            serde_json::to_string_pretty(ctx).unwrap_or_else(|_| "{}".to_string());

        ProtocolRequest {
            model: &self.model,
            temperature: self.temperature,
            tools: self.bridge_tools(),
            tool_choice: "auto",
            functions: self.capabilities.declarations(),
            function_call: "auto",
            text: TextOptions {
                format: OutputFormat {
                    r#type: "json_schema",
                    name: schema::SCHEMA_NAME,
                    strict: true,
                    schema: schema::output_schema(),
                },
            },
            input: vec![
                InputMessage::new("system", PROTOCOL_SYSTEM_PROMPT.to_string()),
                InputMessage::new("user", format!("Context:\n{context_json}")),
            ],
        }
    }

    fn build_chat_request<'a>(
        &'a self,
        messages: &[ChatMessage],
        ctx: &Context,
    ) -> ChatRequest<'a> {
        let mut chat = Vec::with_capacity(messages.len() + 2);
        chat.push(InputMessage::new("system", CHAT_SYSTEM_PROMPT.to_string()));
        chat.push(InputMessage::new("system", ctx.prompt_block()));
        for message in messages {
            chat.push(InputMessage::new(
                message.kind.as_chat_role(),
                message.text.clone(),
            ));
        }

        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: chat,
        }
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ProviderError> {
        let auth_header = self.auth_header()?;
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", auth_header)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER_NAME.to_string(),
                message: format!("request to {path} failed: {}", sanitize_api_error(&e.to_string())),
            })?;

        if !response.status().is_success() {
            return Err(api_error(PROVIDER_NAME, response).await);
        }

        response.json().await.map_err(|e| ProviderError::Decode {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolve an envelope into a reply: protocol-shaped extractions are
    /// validated against the document schema; a recognized function call is
    /// dispatched locally and its raw result passed through.
    fn reply_from_envelope(
        &self,
        envelope: &ResponseEnvelope,
    ) -> Result<ServiceReply, CopilotError> {
        let extraction = match envelope.resolve() {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::error!(
                    envelope = %envelope.raw(),
                    "could not find structured output in model response"
                );
                return Err(e.into());
            }
        };

        match extraction {
            Extraction::FunctionCall { name, arguments } => {
                match self.capabilities.dispatch(&name, arguments) {
                    Some(Ok(result)) => Ok(ServiceReply::Capability(result)),
                    Some(Err(e)) => {
                        tracing::warn!(name = name.as_str(), "capability handler failed: {e:#}");
                        tracing::error!(envelope = %envelope.raw(), "extraction exhausted");
                        Err(ExtractError::NoStructuredOutput.into())
                    }
                    None => {
                        tracing::warn!(name = name.as_str(), "unrecognized function call target");
                        tracing::error!(envelope = %envelope.raw(), "extraction exhausted");
                        Err(ExtractError::NoStructuredOutput.into())
                    }
                }
            }
            Extraction::DirectParsed(value)
            | Extraction::ScannedContent(value)
            | Extraction::RawTextJson(value) => {
                let doc = DailyProtocol::from_value(value)?;
                Ok(ServiceReply::Protocol(doc))
            }
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate_protocol<'a>(
        &'a self,
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceReply, CopilotError>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.build_protocol_request(ctx);
            let raw = self.post_json("/v1/responses", &request).await?;
            let envelope = ResponseEnvelope::from_value(raw);
            self.reply_from_envelope(&envelope)
        })
    }

    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.build_chat_request(messages, ctx);
            let raw = self.post_json("/v1/chat/completions", &request).await?;
            let chat_response: ChatResponse = serde_json::from_value(raw)
                .map_err(|e| anyhow::anyhow!("chat response decode failed: {e}"))?;
            chat_response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| anyhow::anyhow!("No reply from OpenAI"))
        })
    }

    fn warmup(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            // HEAD against the base keeps TLS + pool warm; failures are benign.
            if let Err(e) = self.client.head(&self.base_url).send().await {
                tracing::debug!("warmup request failed: {}", sanitize_api_error(&e.to_string()));
            }
            Ok(())
        })
    }
}
