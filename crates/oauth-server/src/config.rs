//! Configuration loading and management

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::credentials::{RandomTokenGenerator, TokenGenerator};

/// Main configuration for the authorization server
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Confidential clients allowed to request tokens
    #[serde(default = "default_clients")]
    pub clients: Vec<ClientConfig>,

    /// Token configuration
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Scopes advertised in the discovery document
    #[serde(default = "default_scopes")]
    pub scopes_supported: Vec<String>,

    /// The resource owner on whose behalf codes are issued
    #[serde(default)]
    pub resource_owner: ResourceOwnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Exact-match allow-list of redirect URIs
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Access token lifetime in seconds (default: 1 hour)
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime_secs: u64,

    /// Refresh token lifetime in seconds (default: 30 days)
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime_secs: u64,

    /// Authorization code lifetime in seconds (default: 10 minutes)
    #[serde(default = "default_code_lifetime")]
    pub authorization_code_lifetime_secs: u64,
}

/// Upper bound on any configured lifetime (10 years)
const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

impl TokenConfig {
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::seconds(self.access_token_lifetime_secs as i64)
    }

    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::seconds(self.refresh_token_lifetime_secs as i64)
    }

    pub fn authorization_code_lifetime(&self) -> Duration {
        Duration::seconds(self.authorization_code_lifetime_secs as i64)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime_secs: default_access_token_lifetime(),
            refresh_token_lifetime_secs: default_refresh_token_lifetime(),
            authorization_code_lifetime_secs: default_code_lifetime(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOwnerConfig {
    #[serde(default = "default_owner_email")]
    pub email: String,

    #[serde(default = "default_owner_name")]
    pub name: String,

    #[serde(default)]
    pub picture: Option<String>,
}

impl Default for ResourceOwnerConfig {
    fn default() -> Self {
        Self {
            email: default_owner_email(),
            name: default_owner_name(),
            picture: None,
        }
    }
}

fn default_owner_email() -> String {
    "owner@localhost".to_string()
}

fn default_owner_name() -> String {
    "EDEN User".to_string()
}

fn default_access_token_lifetime() -> u64 {
    3600 // 1 hour
}

fn default_refresh_token_lifetime() -> u64 {
    30 * 24 * 3600 // 30 days
}

fn default_code_lifetime() -> u64 {
    600 // 10 minutes
}

fn default_scopes() -> Vec<String> {
    ["gmail.read", "gmail.send", "system.read", "system.write"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_clients() -> Vec<ClientConfig> {
    vec![ClientConfig {
        client_id: "eden-chatgpt-business-client".to_string(),
        // Fresh secret per generated config; persisted by `Config::load`
        client_secret: RandomTokenGenerator.generate(),
        redirect_uris: vec![
            "https://chatgpt.com/auth/callback".to_string(),
            "https://chat.openai.com/auth/callback".to_string(),
            "http://localhost:3000/auth/callback".to_string(),
        ],
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            tokens: TokenConfig::default(),
            scopes_supported: default_scopes(),
            resource_owner: ResourceOwnerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        let config = if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            config
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_file
            );
            let config = Config::default();

            // Create config directory if it doesn't exist
            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config so the generated client secret survives restarts
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Replace the first client's credentials (from CLI flags / environment)
    pub fn override_client(&mut self, client_id: Option<String>, client_secret: Option<String>) {
        let Some(client) = self.clients.first_mut() else {
            return;
        };
        if let Some(id) = client_id {
            client.client_id = id;
        }
        if let Some(secret) = client_secret {
            client.client_secret = secret;
        }
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.clients.is_empty() {
            bail!("At least one client must be configured");
        }

        let mut seen = HashSet::new();
        for client in &self.clients {
            if client.client_id.is_empty() || client.client_secret.is_empty() {
                bail!("Client id and secret must not be empty");
            }
            if !seen.insert(client.client_id.as_str()) {
                bail!("Duplicate client id: {}", client.client_id);
            }
            if client.redirect_uris.is_empty() {
                bail!("Client {} has no redirect URIs", client.client_id);
            }
        }

        let tokens = &self.tokens;
        for secs in [
            tokens.access_token_lifetime_secs,
            tokens.refresh_token_lifetime_secs,
            tokens.authorization_code_lifetime_secs,
        ] {
            if secs == 0 || secs > MAX_LIFETIME_SECS {
                bail!("Token and code lifetimes must be between 1 second and 10 years");
            }
        }

        Ok(())
    }
}
