//! Engine configuration, read once at process start from the environment.

use std::env;
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

#[derive(Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub rate_limit: RateLimitConfig,
    pub provider_base_url: String,
    pub provider_api_key: String,
    pub encryption_key: Option<String>,
    pub tick_shutdown_grace: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let tick_shutdown_grace_secs: u64 = env::var("TICK_SHUTDOWN_GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            rate_limit: RateLimitConfig::from_env(),
            provider_base_url: env::var("PROVIDER_BASE_URL")
                .expect("PROVIDER_BASE_URL must be set"),
            provider_api_key: env::var("PROVIDER_API_KEY")
                .expect("PROVIDER_API_KEY must be set"),
            encryption_key: env::var("ENCRYPTION_KEY").ok(),
            tick_shutdown_grace: Duration::from_secs(tick_shutdown_grace_secs),
        }
    }
}
