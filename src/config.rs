// Settings loading: defaults, then config.toml, then APP_* environment variables

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the PhoneFlip REST backend, without the /api suffix
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub listings_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub featured_limit: u32,
    // Body limit for the shop owner sign-up, which carries three document images
    pub max_upload_mb: usize,
    pub proxy_url: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("backend_url", "http://127.0.0.1:8001")?
            .set_default("request_timeout_secs", 15)?
            .set_default("listings_ttl_secs", 30)?
            .set_default("session_ttl_secs", 300)?
            .set_default("featured_limit", 4)?
            .set_default("max_upload_mb", 20)?
            .add_source(File::with_name("config").required(false))
            // APP_BACKEND_URL, APP_SERVER_ADDRESS, ...
            .add_source(Environment::with_prefix("APP"));

        let settings: Settings = builder
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listings_ttl(&self) -> Duration {
        Duration::from_secs(self.listings_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.backend_url.trim_end_matches('/'), path)
    }
}

#[derive(Deserialize, Debug)]
struct ProxyConfig {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
}

// proxyconfig.json overrides HTTP_PROXY/HTTPS_PROXY for the backend client.
// Must run before the reqwest client is built and before worker threads exist.
pub fn load_and_set_proxy_env_vars(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        tracing::info!("{} not found, skipping proxy environment variable setup.", config_path.display());
        return Ok(());
    }

    tracing::info!("Found {}, loading proxy settings...", config_path.display());
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let proxy_config: ProxyConfig = serde_json::from_str(&config_content)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    for (var, value) in [("HTTP_PROXY", proxy_config.http_proxy), ("HTTPS_PROXY", proxy_config.https_proxy)] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            // SAFETY: called from main before the runtime spawns other threads
            unsafe { env::set_var(var, value) };
            tracing::info!("Set {} environment variable from config.", var);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        server_address: "127.0.0.1:0".into(),
        backend_url: "http://backend.test/".into(),
        request_timeout_secs: 5,
        listings_ttl_secs: 30,
        session_ttl_secs: 60,
        featured_limit: 4,
        max_upload_mb: 20,
        proxy_url: None,
    }
}
