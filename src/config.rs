use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::service::workflow::WorkflowSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Attendance rules
    pub biometric_min_score: u8,
    pub geofence_enforced: bool,
    pub late_grace_minutes: i64,

    pub site_cache_ttl_secs: u64,
    pub notifier_buffer: usize,
    pub log_dir: String,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: var_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: var_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            biometric_min_score: var_or("BIOMETRIC_MIN_SCORE", 85)?,
            geofence_enforced: var_or("GEOFENCE_ENFORCED", true)?,
            late_grace_minutes: var_or("LATE_GRACE_MINUTES", 15)?,

            site_cache_ttl_secs: var_or("SITE_CACHE_TTL_SECS", 300)?,
            notifier_buffer: var_or("NOTIFIER_BUFFER", 64)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if self.biometric_min_score > 100 {
            bail!("BIOMETRIC_MIN_SCORE must be between 0 and 100");
        }
        if self.late_grace_minutes < 0 {
            bail!("LATE_GRACE_MINUTES must not be negative");
        }
        Ok(())
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            default_threshold: self.biometric_min_score,
            geofence_enforced: self.geofence_enforced,
            late_grace: chrono::Duration::minutes(self.late_grace_minutes),
        }
    }

    pub fn site_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.site_cache_ttl_secs)
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".into(),
            database_url: None,
            jwt_secret: "test-secret".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_refresh_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            biometric_min_score: 85,
            geofence_enforced: true,
            late_grace_minutes: 15,
            site_cache_ttl_secs: 60,
            notifier_buffer: 16,
            log_dir: "logs".into(),
        }
    }
}
