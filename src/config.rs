use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub min_password_length: usize,
    pub reset_token_ttl_minutes: i64,
    pub reset_link_base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: 6,
            reset_token_ttl_minutes: 60,
            reset_link_base: "http://localhost:3000/reset-password".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            min_password_length: env_or("MIN_PASSWORD_LENGTH", defaults.min_password_length)?,
            reset_token_ttl_minutes: env_or(
                "RESET_TOKEN_TTL_MINUTES",
                defaults.reset_token_ttl_minutes,
            )?,
            reset_link_base: std::env::var("RESET_LINK_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.reset_link_base),
        };
        auth.validate()?;
        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            auth,
        })
    }
}

/// Upper bound for `RESET_TOKEN_TTL_MINUTES`: one week.
pub const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

impl AuthConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.min_password_length >= 1,
            "MIN_PASSWORD_LENGTH must be at least 1"
        );
        anyhow::ensure!(
            (1..=MAX_RESET_TOKEN_TTL_MINUTES).contains(&self.reset_token_ttl_minutes),
            "RESET_TOKEN_TTL_MINUTES must be between 1 and {}, got {}",
            MAX_RESET_TOKEN_TTL_MINUTES,
            self.reset_token_ttl_minutes
        );
        Ok(())
    }
}

/// Reads `key` and parses it, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, v)),
        Err(_) => Ok(default),
    }
}
