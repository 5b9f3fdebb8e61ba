// todo_service/src/config.rs
use anyhow::{bail, Context, Result};
use chrono::Duration;

pub const DEFAULT_DATABASE_URL: &str = "todos.db";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
/// One week.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
/// Range accepted by `bcrypt::hash`.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

/// Credentials for the admin account created at start-up when configured.
#[derive(Clone)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
}

/// Settings for the description enrichment endpoint.
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: std::time::Duration,
}

/// Runtime configuration, managed as Rocket state.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminAccount>,
    pub ai: Option<AiConfig>,
}

impl AppConfig {
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        AppConfig {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin: None,
            ai: None,
        }
    }

    /// Load from the process environment, honouring a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;

        let ttl_minutes = match get("TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("TOKEN_TTL_MINUTES is not an integer: {raw}"))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            bail!("TOKEN_TTL_MINUTES must be between 1 and {MAX_TOKEN_TTL_MINUTES}, got {ttl_minutes}");
        }
        let token_ttl = Duration::try_minutes(ttl_minutes)
            .with_context(|| format!("TOKEN_TTL_MINUTES is out of range: {ttl_minutes}"))?;

        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("BCRYPT_COST is not an integer: {raw}"))?,
            None => bcrypt::DEFAULT_COST,
        };
        if !BCRYPT_COST_RANGE.contains(&bcrypt_cost) {
            bail!(
                "BCRYPT_COST must be between {} and {}, got {bcrypt_cost}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end()
            );
        }

        let ai_timeout_secs = match get("AI_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("AI_TIMEOUT_SECS is not an integer: {raw}"))?,
            None => DEFAULT_AI_TIMEOUT_SECS,
        };
        if ai_timeout_secs == 0 {
            bail!("AI_TIMEOUT_SECS must be positive");
        }

        let admin = match (get("ADMIN_USERNAME"), get("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminAccount { username, password }),
            (None, None) => None,
            _ => bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together"),
        };

        let ai = get("AI_API_KEY").map(|api_key| AiConfig {
            api_key,
            api_url: get("AI_API_URL").unwrap_or_else(|| DEFAULT_AI_API_URL.to_string()),
            model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            timeout: std::time::Duration::from_secs(ai_timeout_secs),
        });

        Ok(AppConfig {
            database_url,
            jwt_secret,
            token_ttl,
            bcrypt_cost,
            admin,
            ai,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.token_ttl, Duration::minutes(30));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.admin.is_none());
        assert!(config.ai.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(load(&[]).is_err());
        assert!(load(&[("JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn ttl_must_be_a_positive_integer() {
        assert!(load(&[("JWT_SECRET", "x"), ("TOKEN_TTL_MINUTES", "abc")]).is_err());
        assert!(load(&[("JWT_SECRET", "x"), ("TOKEN_TTL_MINUTES", "0")]).is_err());
        let config = load(&[("JWT_SECRET", "x"), ("TOKEN_TTL_MINUTES", "5")]).unwrap();
        assert_eq!(config.token_ttl, Duration::minutes(5));
    }

    #[test]
    fn oversized_ttl_is_rejected_without_panicking() {
        assert!(load(&[("JWT_SECRET", "x"), ("TOKEN_TTL_MINUTES", "9223372036854775807")]).is_err());
        assert!(load(&[("JWT_SECRET", "x"), ("TOKEN_TTL_MINUTES", "10081")]).is_err());
        let config = load(&[("JWT_SECRET", "x"), ("TOKEN_TTL_MINUTES", "10080")]).unwrap();
        assert_eq!(config.token_ttl, Duration::days(7));
    }

    #[test]
    fn bcrypt_cost_must_be_in_range() {
        assert!(load(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "3")]).is_err());
        assert!(load(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "32")]).is_err());
        assert!(load(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "many")]).is_err());
        let config = load(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "4")]).unwrap();
        assert_eq!(config.bcrypt_cost, 4);
    }

    #[test]
    fn admin_needs_both_username_and_password() {
        assert!(load(&[("JWT_SECRET", "x"), ("ADMIN_USERNAME", "root1")]).is_err());
        let config = load(&[
            ("JWT_SECRET", "x"),
            ("ADMIN_USERNAME", "root1"),
            ("ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();
        assert_eq!(config.admin.unwrap().username, "root1");
    }

    #[test]
    fn ai_is_enabled_by_api_key() {
        let config = load(&[("JWT_SECRET", "x"), ("AI_API_KEY", "k"), ("AI_MODEL", "m")]).unwrap();
        let ai = config.ai.unwrap();
        assert_eq!(ai.api_url, DEFAULT_AI_API_URL);
        assert_eq!(ai.model, "m");
        assert_eq!(ai.timeout, std::time::Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS));
    }

    #[test]
    fn ai_timeout_is_configurable() {
        let config = load(&[("JWT_SECRET", "x"), ("AI_API_KEY", "k"), ("AI_TIMEOUT_SECS", "3")]).unwrap();
        assert_eq!(config.ai.unwrap().timeout, std::time::Duration::from_secs(3));
        assert!(load(&[("JWT_SECRET", "x"), ("AI_TIMEOUT_SECS", "0")]).is_err());
    }
}
