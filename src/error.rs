use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `chilib`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum CopilotError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Upstream model / provider ───────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Response-envelope extraction ────────────────────────────────────
    #[error("extract: {0}")]
    Extract(#[from] ExtractError),

    // ── Protocol document schema ────────────────────────────────────────
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),

    // ── Local storage ───────────────────────────────────────────────────
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    // ── Gateway / transport ─────────────────────────────────────────────
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required upstream credentials/URLs are absent. Carries every missing
    /// name so the operator sees the full list in one pass.
    #[error("missing required env vars: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Provider errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    /// Non-success status from the upstream API. The body is already
    /// secret-scrubbed and length-bounded.
    #[error("{provider} API error ({status}): {body}")]
    Upstream {
        provider: String,
        status: String,
        body: String,
    },

    #[error("{provider} API key not set. Set OPENAI_API_KEY.")]
    Auth { provider: String },

    #[error("{provider} response decode failed: {message}")]
    Decode { provider: String, message: String },
}

// ─── Extraction errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Every extraction strategy was exhausted. The full envelope is logged at
    /// the call site; it is never relayed to the client.
    #[error("no structured output found in model response")]
    NoStructuredOutput,
}

// ─── Protocol document errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("document does not match the DailyProtocol schema: {0}")]
    Schema(String),

    #[error("protocol document has no blocks")]
    EmptyBlocks,
}

// ─── Storage errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("open failed: {0}")]
    Open(String),

    #[error("sqlx: {0}")]
    Sqlx(#[from] sqlx::Error),
}

// ─── Gateway errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bind failed: {0}")]
    Bind(String),

    #[error("capability {name} failed: {message}")]
    Capability { name: String, message: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, CopilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_enumerates_every_name() {
        let err = CopilotError::Config(ConfigError::MissingEnv(vec![
            "OPENAI_API_KEY".into(),
            "ZAPIER_MCP_URL".into(),
            "ZAPIER_MCP_KEY".into(),
        ]));
        let text = err.to_string();
        assert!(text.contains("OPENAI_API_KEY"));
        assert!(text.contains("ZAPIER_MCP_URL"));
        assert!(text.contains("ZAPIER_MCP_KEY"));
    }

    #[test]
    fn extract_error_displays_correctly() {
        let err = CopilotError::Extract(ExtractError::NoStructuredOutput);
        assert!(err.to_string().contains("no structured output"));
    }

    #[test]
    fn protocol_empty_blocks_displays_correctly() {
        let err = CopilotError::Protocol(ProtocolError::EmptyBlocks);
        assert!(err.to_string().contains("no blocks"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: CopilotError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }
}
