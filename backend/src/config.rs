//! Configuration for the marketplace backend.

use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub oidc: OidcConfig,
    #[serde(default)]
    pub identity_toolkit: IdentityToolkitConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub phone: PhoneConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// "production" turns on secure cookies.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

/// OIDC issuer whose ID tokens are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// OAuth client ID. Audience validation is skipped when unset.
    #[serde(default)]
    pub audience: Option<String>,
    /// Other `iss` values accepted for the same issuer (Google also signs
    /// tokens with the scheme-less `accounts.google.com`).
    #[serde(default)]
    pub extra_issuers: Vec<String>,
    /// Minimum spacing between key refreshes triggered by unknown `kid`s.
    #[serde(default = "default_jwks_min_refresh_secs")]
    pub jwks_min_refresh_secs: u64,
}

impl OidcConfig {
    pub fn jwks_min_refresh(&self) -> Duration {
        Duration::from_secs(self.jwks_min_refresh_secs)
    }

    pub fn accepted_issuers(&self) -> Vec<String> {
        let mut issuers = vec![self.issuer.trim_end_matches('/').to_string()];
        for extra in &self.extra_issuers {
            if !issuers.contains(extra) {
                issuers.push(extra.clone());
            }
        }
        issuers
    }
}

/// REST endpoint used to create password accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityToolkitConfig {
    #[serde(default = "default_identity_toolkit_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for IdentityToolkitConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_toolkit_url(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for session credentials.
    pub secret: String,
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// Shortest accepted session secret, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneConfig {
    /// Calling code applied to local-format numbers, without the `+`.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Upper bound for each call to the token verifier or the user store.
    #[serde(default = "default_external_call_secs")]
    pub external_call_secs: u64,
}

impl TimeoutsConfig {
    pub fn external_call(&self) -> Duration {
        Duration::from_secs(self.external_call_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            external_call_secs: default_external_call_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_issuer() -> String {
    "https://accounts.google.com".to_string()
}
fn default_jwks_min_refresh_secs() -> u64 {
    30
}
fn default_identity_toolkit_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}
fn default_database_url() -> String {
    "sqlite:./data/marketplace.db".to_string()
}
fn default_session_ttl() -> u64 {
    // 5 days
    60 * 60 * 24 * 5
}
fn default_cookie_name() -> String {
    "session".to_string()
}
fn default_country_code() -> String {
    "233".to_string()
}
fn default_external_call_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MARKET__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("oidc.issuer", default_issuer())?
            .set_default("session.ttl_secs", default_session_ttl() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("MARKET")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("oidc.extra_issuers")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would leave the service insecure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.secret.trim().len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }
        Ok(())
    }
}
