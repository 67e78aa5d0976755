use crate::context::Context;
use crate::error::CopilotError;
use crate::protocol::DailyProtocol;
use crate::storage::ChatMessage;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// What the protocol service hands back to the caller.
///
/// A legacy function-call response is a distinct, non-protocol shape and is
/// returned as-is, never coerced into the protocol schema, hence the
/// untagged serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServiceReply {
    Protocol(DailyProtocol),
    Capability(Value),
}

impl ServiceReply {
    pub fn as_protocol(&self) -> Option<&DailyProtocol> {
        match self {
            Self::Protocol(doc) => Some(doc),
            Self::Capability(_) => None,
        }
    }
}

/// Upstream completion seam. Explicitly constructed and dependency-injected
/// (no process-global SDK client), so the resolver and fallback logic stay
/// unit-testable without live credentials.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "openai").
    fn name(&self) -> &str;

    /// Issue exactly one completion call carrying the declared output schema
    /// and the bridge tool, then resolve the response envelope into a reply.
    fn generate_protocol<'a>(
        &'a self,
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceReply, CopilotError>> + Send + 'a>>;

    /// Free-form chat turn over the message history plus rendered context.
    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

    /// Warm up the HTTP connection pool. Default is a no-op.
    fn warmup(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }
}
