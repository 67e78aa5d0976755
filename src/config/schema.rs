use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Upstream model API key. Usually supplied via OPENAI_API_KEY.
    pub api_key: Option<String>,
    /// Upstream API base URL (no trailing slash).
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model name is a deployment-time choice, not part of the contract.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

fn default_api_base() -> String {
    "https://api.openai.com".into()
}

fn default_model() -> String {
    "gpt-4.1-mini".into()
}

fn default_temperature() -> f64 {
    0.2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            bridge: BridgeConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            reliability: ReliabilityConfig::default(),
        }
    }
}

// ── Automation bridge (MCP) ─────────────────────────────────────

/// Connection details for the automation bridge the model may invoke
/// mid-completion. The service only supplies credentials; it does not inspect
/// individual tool invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge endpoint URL. Usually supplied via ZAPIER_MCP_URL.
    #[serde(default)]
    pub server_url: Option<String>,
    /// Bearer credential for the bridge. Usually supplied via ZAPIER_MCP_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_bridge_label")]
    pub server_label: String,
}

fn default_bridge_label() -> String {
    "zapier".into()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            server_label: default_bridge_label(),
        }
    }
}

// ── Gateway ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 3000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Per-request timeout in seconds. The resolver has no partial-result
    /// path, so an upstream stall must be bounded here.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Local storage ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. `~` is expanded; empty means
    /// `<workspace>/chilib.db`.
    #[serde(default)]
    pub db_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: None }
    }
}

impl StorageConfig {
    pub fn resolve_db_path(&self, workspace_dir: &Path) -> PathBuf {
        match self.db_path.as_deref() {
            Some(raw) if !raw.is_empty() => {
                PathBuf::from(shellexpand::tilde(raw).into_owned())
            }
            _ => workspace_dir.join("chilib.db"),
        }
    }
}

// ── Reliability (optional hardening, off by default) ────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Extra attempts after the first failure. 0 disables retries; the
    /// primary paths make exactly one model call per request.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

fn default_base_backoff_ms() -> u64 {
    1000
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

// ── Load / save / env ───────────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let chilib_dir = home.join(".chilib");
        let config_path = chilib_dir.join("config.toml");

        if !chilib_dir.exists() {
            fs::create_dir_all(&chilib_dir).context("Failed to create .chilib directory")?;
            fs::create_dir_all(chilib_dir.join("workspace"))
                .context("Failed to create workspace directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.workspace_dir = chilib_dir.join("workspace");
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                workspace_dir: chilib_dir.join("workspace"),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config.
    ///
    /// Credential names deliberately match the deployed service
    /// (OPENAI_API_KEY, ZAPIER_MCP_URL, ZAPIER_MCP_KEY) so one set of env vars
    /// works for both.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            if !base.is_empty() {
                self.api_base = base.trim_end_matches('/').to_string();
            }
        }

        if let Ok(url) = std::env::var("ZAPIER_MCP_URL") {
            if !url.is_empty() {
                self.bridge.server_url = Some(url);
            }
        }

        if let Ok(key) = std::env::var("ZAPIER_MCP_KEY") {
            if !key.is_empty() {
                self.bridge.api_key = Some(key);
            }
        }

        if let Ok(model) = std::env::var("CHILIB_MODEL") {
            if !model.is_empty() {
                self.model = model;
            }
        }

        if let Ok(port_str) = std::env::var("CHILIB_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
        {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        if let Ok(host) = std::env::var("CHILIB_GATEWAY_HOST").or_else(|_| std::env::var("HOST")) {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }

        if let Ok(temp_str) = std::env::var("CHILIB_TEMPERATURE") {
            if let Ok(temp) = temp_str.parse::<f64>() {
                if (0.0..=2.0).contains(&temp) {
                    self.temperature = temp;
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(raw) = self.bridge.server_url.as_deref() {
            url::Url::parse(raw)
                .map_err(|e| ConfigError::Validation(format!("bridge.server_url: {e}")))?;
        }
        Ok(())
    }

    /// Check every upstream credential before spending a model call on a
    /// request that is guaranteed to be unusable downstream.
    ///
    /// Returns the full list of missing names, not just the first.
    pub fn require_upstream(&self) -> std::result::Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push("OPENAI_API_KEY".to_string());
        }
        if self.bridge.server_url.as_deref().is_none_or(str::is_empty) {
            missing.push("ZAPIER_MCP_URL".to_string());
        }
        if self.bridge.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push("ZAPIER_MCP_KEY".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingEnv(missing))
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> Config {
        Config {
            workspace_dir: PathBuf::from("/tmp/ws"),
            config_path: PathBuf::from("/tmp/ws/config.toml"),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.api_base, "https://api.openai.com");
        assert_eq!(c.gateway.port, 3000);
        assert_eq!(c.gateway.host, "127.0.0.1");
        assert_eq!(c.gateway.request_timeout_secs, 30);
        assert_eq!(c.reliability.max_retries, 0);
        assert_eq!(c.bridge.server_label, "zapier");
    }

    #[test]
    fn require_upstream_enumerates_all_missing_names() {
        let c = bare_config();
        let err = c.require_upstream().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("OPENAI_API_KEY"));
        assert!(text.contains("ZAPIER_MCP_URL"));
        assert!(text.contains("ZAPIER_MCP_KEY"));
    }

    #[test]
    fn require_upstream_reports_only_the_absent_ones() {
        let mut c = bare_config();
        c.api_key = Some("sk-test".into());
        c.bridge.server_url = Some("https://mcp.example.com/api".into());
        let err = c.require_upstream().unwrap_err();
        let text = err.to_string();
        assert!(!text.contains("OPENAI_API_KEY"));
        assert!(!text.contains("ZAPIER_MCP_URL"));
        assert!(text.contains("ZAPIER_MCP_KEY"));
    }

    #[test]
    fn require_upstream_passes_when_fully_configured() {
        let mut c = bare_config();
        c.api_key = Some("sk-test".into());
        c.bridge.server_url = Some("https://mcp.example.com/api".into());
        c.bridge.api_key = Some("bridge-key".into());
        assert!(c.require_upstream().is_ok());
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let mut c = bare_config();
        c.api_key = Some(String::new());
        c.bridge.server_url = Some(String::new());
        c.bridge.api_key = Some(String::new());
        let err = c.require_upstream().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_parses_from_toml() {
        let toml_str = r#"
            api_key = "sk-abc"
            model = "gpt-4.1"

            [bridge]
            server_url = "https://mcp.zapier.com/api/mcp/mcp"
            api_key = "bridge-secret"

            [gateway]
            port = 8787
            request_timeout_secs = 15
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.api_key.as_deref(), Some("sk-abc"));
        assert_eq!(c.model, "gpt-4.1");
        assert_eq!(c.gateway.port, 8787);
        assert_eq!(c.gateway.request_timeout_secs, 15);
        assert_eq!(
            c.bridge.server_url.as_deref(),
            Some("https://mcp.zapier.com/api/mcp/mcp")
        );
        assert_eq!(c.bridge.server_label, "zapier");
    }

    #[test]
    fn storage_path_defaults_to_workspace() {
        let c = bare_config();
        let path = c.storage.resolve_db_path(&c.workspace_dir);
        assert_eq!(path, PathBuf::from("/tmp/ws/chilib.db"));
    }

    #[test]
    fn storage_path_expands_tilde() {
        let storage = StorageConfig {
            db_path: Some("~/chili/db.sqlite".into()),
        };
        let path = storage.resolve_db_path(Path::new("/tmp/ws"));
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.to_string_lossy().ends_with("chili/db.sqlite"));
    }
}
