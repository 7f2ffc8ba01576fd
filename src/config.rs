use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub auth: Auth,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}
fn default_bind_addr() -> String { "127.0.0.1".to_string() }
fn default_base_path() -> String { "/panel".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    pub bearer_token: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    #[serde(default = "default_max_request_kb")]
    pub max_request_kb: usize,
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: u32,
    #[serde(default = "default_rate_burst")]
    pub rate_burst: u32,
    #[serde(default = "default_token_rate_per_sec")]
    pub token_rate_per_sec: u32,
    #[serde(default = "default_token_rate_burst")]
    pub token_rate_burst: u32,
}
fn default_max_request_kb() -> usize { 256 }
/// Upper bound for `max_request_kb` (64 MiB).
pub const MAX_REQUEST_KB_LIMIT: usize = 64 * 1024;
fn default_rate_per_sec() -> u32 { 50 }
fn default_rate_burst() -> u32 { 100 }
fn default_token_rate_per_sec() -> u32 { 25 }
fn default_token_rate_burst() -> u32 { 50 }

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_request_kb: default_max_request_kb(),
            rate_per_sec: default_rate_per_sec(),
            rate_burst: default_rate_burst(),
            token_rate_per_sec: default_token_rate_per_sec(),
            token_rate_burst: default_token_rate_burst(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server.base_path.starts_with('/') || self.server.base_path.ends_with('/') {
            anyhow::bail!("base_path must start with '/' and not end with one: {}", self.server.base_path);
        }
        if self.auth.bearer_token.trim().is_empty() { anyhow::bail!("bearer_token must not be empty"); }
        if self.auth.allowed_origins.is_empty() { anyhow::bail!("allowed_origins must not be empty"); }
        if self.auth.allowed_origins.iter().any(|o| o == "*") { anyhow::bail!("allowed_origins must list explicit origins"); }
        if self.limits.max_request_kb == 0 || self.limits.max_request_kb > MAX_REQUEST_KB_LIMIT {
            anyhow::bail!("max_request_kb must be in 1..={MAX_REQUEST_KB_LIMIT}");
        }
        if self.limits.rate_per_sec == 0 || self.limits.token_rate_per_sec == 0 {
            anyhow::bail!("rate limits must be > 0");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }
}
