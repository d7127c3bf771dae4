use crate::config::validation::{ValidationError, ValidationUtils, Validator};
use crate::serializer::SerializerKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 應用程序配置結構
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub cache: CacheConfig,
    pub redis: RedisConfig,
    pub log: LogConfig,
}

impl Validator for ApplicationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.cache.validate()?;
        if self.cache.remote_enabled {
            self.redis.validate()?;
        }
        self.log.validate()?;

        Ok(())
    }
}

/// 快取配置
///
/// TTL 以秒為單位；未列出的欄位使用與 `CacheBuilder` 相同的預設值。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub memory_enabled: bool,
    pub memory_capacity_bytes: u64,
    pub memory_ttl_secs: u64,
    pub remote_enabled: bool,
    pub remote_ttl_secs: u64,
    pub cache_absence: bool,
    pub absence_ttl_secs: u64,
    pub serializer: SerializerKind,
    /// Redis 鍵命名空間
    pub key_namespace: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_capacity_bytes: 64 * 1024 * 1024,
            memory_ttl_secs: 5 * 60,
            remote_enabled: true,
            remote_ttl_secs: 14 * 24 * 60 * 60,
            cache_absence: false,
            absence_ttl_secs: 60,
            serializer: SerializerKind::Json,
            key_namespace: None,
        }
    }
}

impl CacheConfig {
    pub fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }

    pub fn remote_ttl(&self) -> Duration {
        Duration::from_secs(self.remote_ttl_secs)
    }

    pub fn absence_ttl(&self) -> Duration {
        Duration::from_secs(self.absence_ttl_secs)
    }
}

impl Validator for CacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.memory_enabled && !self.remote_enabled {
            return Err(ValidationError::InvalidValue(
                "cache.memory_enabled 與 cache.remote_enabled 至少需要啟用一個".to_string(),
            ));
        }

        if self.memory_enabled {
            ValidationUtils::positive(self.memory_capacity_bytes, "cache.memory_capacity_bytes")?;
            ValidationUtils::positive(self.memory_ttl_secs, "cache.memory_ttl_secs")?;
        }
        if self.remote_enabled {
            ValidationUtils::positive(self.remote_ttl_secs, "cache.remote_ttl_secs")?;
        }
        if self.cache_absence {
            ValidationUtils::positive(self.absence_ttl_secs, "cache.absence_ttl_secs")?;
        }
        if let Some(namespace) = &self.key_namespace {
            ValidationUtils::not_empty(namespace, "cache.key_namespace")?;
        }

        Ok(())
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
    pub connection_timeout_secs: u64,
    #[serde(default = "default_recycle_timeout_secs")]
    pub recycle_timeout_secs: u64,
}

fn default_recycle_timeout_secs() -> u64 {
    60
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 16,
            connection_timeout_secs: 5,
            recycle_timeout_secs: default_recycle_timeout_secs(),
        }
    }
}

impl Validator for RedisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::not_empty(&self.url, "redis.url")?;
        ValidationUtils::in_range(self.pool_size, 1, 1024, "redis.pool_size")?;
        ValidationUtils::in_range(
            self.connection_timeout_secs,
            1,
            60,
            "redis.connection_timeout_secs",
        )?;

        Ok(())
    }
}

/// 日誌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
    /// 設置後額外輸出按日輪替的日誌文件
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
        }
    }
}

impl Validator for LogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::one_of(
            &self.level.to_lowercase().as_str(),
            &["trace", "debug", "info", "warn", "error"],
            "log.level",
        )?;

        ValidationUtils::one_of(
            &self.format.to_lowercase().as_str(),
            &["pretty", "json"],
            "log.format",
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_cache_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory_ttl(), Duration::from_secs(300));
        assert_eq!(config.remote_ttl(), Duration::from_secs(14 * 24 * 3600));
        assert_eq!(config.absence_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_no_tier_enabled() {
        let config = CacheConfig {
            memory_enabled: false,
            remote_enabled: false,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(ValidationError::InvalidValue(_)));
    }

    #[test]
    fn test_zero_ttl_only_checked_for_enabled_tier() {
        let config = CacheConfig {
            remote_enabled: false,
            remote_ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = CacheConfig {
            memory_ttl_secs: 0,
            ..Default::default()
        };
        assert_matches!(
            config.validate(),
            Err(ValidationError::RangeError { ref field, .. }) if field == "cache.memory_ttl_secs"
        );
    }

    #[test]
    fn test_absence_ttl_checked_when_enabled() {
        let config = CacheConfig {
            cache_absence: true,
            absence_ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_skipped_when_remote_disabled() {
        let config = ApplicationConfig {
            cache: CacheConfig {
                remote_enabled: false,
                ..Default::default()
            },
            redis: RedisConfig {
                url: String::new(),
                ..Default::default()
            },
            log: LogConfig::default(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_format_validation() {
        let log = LogConfig {
            format: "xml".to_string(),
            ..Default::default()
        };
        assert!(log.validate().is_err());
    }
}
