use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::AppConfig;

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub redis_url: String,
    pub connection_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&AppConfig> for RedisConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            redis_url: config.redis_url.clone(),
            connection_timeout: Duration::from_secs(config.redis_connection_timeout),
            retry_attempts: config.redis_retry_attempts,
            retry_delay: Duration::from_millis(config.redis_retry_delay_ms),
        }
    }
}

impl RedisConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.redis_url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err("Redis URL must use the redis:// or rediss:// scheme".to_string());
        }
        if self.connection_timeout.as_secs() == 0 {
            return Err("Connection timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> RedisConfig {
        RedisConfig {
            redis_url: url.to_string(),
            connection_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_validate() {
        assert!(config("redis://localhost:6379").validate().is_ok());
        assert!(config("").validate().is_err());
        assert!(config("http://localhost:6379").validate().is_err());
    }
}
