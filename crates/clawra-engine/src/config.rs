//! Runtime configuration.
//!
//! The process environment is read once, here. Providers, the registry and
//! the dispatcher only ever see the resolved values.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clawra_contracts::ProviderId;
use tracing::warn;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:18789";
pub const DEFAULT_DELIVERY_COMMAND: &str = "openclaw message send";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

pub const PROVIDER_ENV: &str = "IMAGE_PROVIDER";
pub const GATEWAY_URL_ENV: &str = "OPENCLAW_GATEWAY_URL";
pub const GATEWAY_TOKEN_ENV: &str = "OPENCLAW_GATEWAY_TOKEN";
pub const DELIVERY_COMMAND_ENV: &str = "CLAWRA_DELIVERY_COMMAND";
pub const HTTP_TIMEOUT_ENV: &str = "CLAWRA_HTTP_TIMEOUT_SECS";
pub const OUTPUT_DIR_ENV: &str = "CLAWRA_OUTPUT_DIR";

pub fn api_base_var(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Fal => "FAL_API_BASE",
        ProviderId::Openai => "OPENAI_API_BASE",
        ProviderId::Google => "GEMINI_API_BASE",
        ProviderId::Xai => "XAI_API_BASE",
    }
}

/// Everything one provider adapter needs to issue its request.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub timeout: Duration,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub default_provider: Option<String>,
    pub credentials: HashMap<ProviderId, String>,
    pub api_bases: HashMap<ProviderId, String>,
    pub http_timeout: Duration,
    pub output_dir: PathBuf,
    pub gateway: GatewaySettings,
    pub delivery_command: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let timeout = Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS);
        Self {
            default_provider: None,
            credentials: HashMap::new(),
            api_bases: HashMap::new(),
            http_timeout: timeout,
            output_dir: env::temp_dir(),
            gateway: GatewaySettings {
                base_url: DEFAULT_GATEWAY_URL.to_string(),
                token: None,
                timeout,
            },
            delivery_command: default_delivery_command(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        config.default_provider = read(PROVIDER_ENV);

        for id in ProviderId::ALL {
            if let Some(key) = read(id.credential_var()) {
                config.credentials.insert(id, key);
            }
            if let Some(base) = read(api_base_var(id)) {
                config
                    .api_bases
                    .insert(id, base.trim_end_matches('/').to_string());
            }
        }

        if let Some(raw) = read(HTTP_TIMEOUT_ENV) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.http_timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid {HTTP_TIMEOUT_ENV}"),
            }
        }
        config.gateway.timeout = config.http_timeout;

        if let Some(dir) = read(OUTPUT_DIR_ENV) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(url) = read(GATEWAY_URL_ENV) {
            config.gateway.base_url = url.trim_end_matches('/').to_string();
        }
        config.gateway.token = read(GATEWAY_TOKEN_ENV);

        if let Some(raw) = read(DELIVERY_COMMAND_ENV) {
            match shell_words::split(&raw) {
                Ok(words) if !words.is_empty() => config.delivery_command = words,
                _ => warn!(value = %raw, "ignoring unparseable {DELIVERY_COMMAND_ENV}"),
            }
        }

        config
    }

    pub fn with_credential(mut self, id: ProviderId, key: impl Into<String>) -> Self {
        self.credentials.insert(id, key.into());
        self
    }

    pub fn with_api_base(mut self, id: ProviderId, base: impl Into<String>) -> Self {
        self.api_bases.insert(id, base.into());
        self
    }

    pub fn has_credential(&self, id: ProviderId) -> bool {
        self.credentials.contains_key(&id)
    }

    pub fn provider_settings(&self, id: ProviderId) -> ProviderSettings {
        ProviderSettings {
            api_key: self.credentials.get(&id).cloned(),
            api_base: self.api_bases.get(&id).cloned(),
            timeout: self.http_timeout,
            output_dir: self.output_dir.clone(),
        }
    }
}

fn default_delivery_command() -> Vec<String> {
    DEFAULT_DELIVERY_COMMAND
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
