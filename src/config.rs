//! Runtime configuration loaded from the environment

use rand::{distr::Alphanumeric, Rng};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// HS256 secret for access tokens
    pub jwt_secret: String,
    /// Lifetime of a poll in the store, and of the tokens issued for it
    pub poll_duration: Duration,
    pub max_nomination_length: usize,
    /// How often expired polls are purged from the store
    pub expiry_sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            jwt_secret: random_secret(),
            poll_duration: Duration::from_secs(7200),
            max_nomination_length: 100,
            expiry_sweep_interval: Duration::from_secs(60),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable value for {}: {:?}", key, raw);
            None
        }
    }
}

fn random_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = match env_value("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "JWT_SECRET not set - using a random secret, issued tokens will not survive a restart"
                );
                defaults.jwt_secret
            }
        };

        let config = Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            jwt_secret,
            poll_duration: env_parse("POLL_DURATION")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_duration),
            max_nomination_length: env_parse("MAX_NOMINATION_LENGTH")
                .unwrap_or(defaults.max_nomination_length),
            expiry_sweep_interval: env_parse("EXPIRY_SWEEP_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_sweep_interval),
        };

        tracing::info!(
            port = config.port,
            poll_duration_secs = config.poll_duration.as_secs(),
            max_nomination_length = config.max_nomination_length,
            sweep_interval_secs = config.expiry_sweep_interval.as_secs(),
            "Configuration loaded"
        );

        config
    }
}
