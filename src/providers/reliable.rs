use super::traits::{Provider, ServiceReply};
use crate::context::Context;
use crate::error::CopilotError;
use crate::storage::ChatMessage;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Check if an error is non-retryable (client errors that won't resolve with
/// retries). 429 and 408 are transient and stay retryable.
fn is_non_retryable(message: &str) -> bool {
    for word in message.split(|c: char| !c.is_ascii_digit()) {
        if let Ok(code) = word.parse::<u16>()
            && (400..500).contains(&code)
        {
            return code != 429 && code != 408;
        }
    }
    false
}

/// Optional hardening around a provider: exponential-backoff retry up to
/// `max_retries` extra attempts. Not part of the primary contract: the
/// default configuration keeps it disabled so each request spends exactly one
/// model call.
pub struct ReliableProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
    base_backoff_ms: u64,
}

impl ReliableProvider {
    pub fn new(inner: Arc<dyn Provider>, max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff_ms: base_backoff_ms.max(50),
        }
    }
}

impl Provider for ReliableProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn generate_protocol<'a>(
        &'a self,
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceReply, CopilotError>> + Send + 'a>> {
        Box::pin(async move {
            let mut backoff_ms = self.base_backoff_ms;
            let mut last_err = None;

            for attempt in 0..=self.max_retries {
                match self.inner.generate_protocol(ctx).await {
                    Ok(reply) => {
                        if attempt > 0 {
                            tracing::info!(attempt, "provider recovered after retries");
                        }
                        return Ok(reply);
                    }
                    // Extraction and schema failures are contract violations,
                    // not transient transport faults.
                    Err(e @ (CopilotError::Extract(_) | CopilotError::Protocol(_))) => {
                        return Err(e);
                    }
                    Err(e) => {
                        if is_non_retryable(&e.to_string()) || attempt == self.max_retries {
                            return Err(e);
                        }
                        tracing::warn!(attempt, backoff_ms, "provider call failed, retrying: {e}");
                        last_err = Some(e);
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = backoff_ms.saturating_mul(2);
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| {
                CopilotError::Other(anyhow::anyhow!("retry loop exited without an error"))
            }))
        })
    }

    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        ctx: &'a Context,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut backoff_ms = self.base_backoff_ms;

            for attempt in 0..=self.max_retries {
                match self.inner.chat(messages, ctx).await {
                    Ok(reply) => return Ok(reply),
                    Err(e) => {
                        if is_non_retryable(&e.to_string()) || attempt == self.max_retries {
                            return Err(e);
                        }
                        tracing::warn!(attempt, backoff_ms, "chat call failed, retrying: {e}");
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = backoff_ms.saturating_mul(2);
                    }
                }
            }

            Err(anyhow::anyhow!("retry loop exited without an error"))
        })
    }

    fn warmup(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.inner.warmup()
    }
}
