use crate::config::loader::{ConfigLoader, Environment};
use crate::config::types::ApplicationConfig;
use crate::config::validation::{ValidationError, Validator};
use config::ConfigError;
use once_cell::sync::OnceCell;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

// 全局配置實例
static CONFIG: OnceCell<ApplicationConfig> = OnceCell::new();

/// 配置加載錯誤
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("配置讀取失敗: {0}")]
    Source(#[from] ConfigError),

    #[error("配置驗證失敗: {0}")]
    Validation(#[from] ValidationError),
}

/// 獲取已初始化的全局配置
///
/// 尚未呼叫 [`init_config`] 時返回 `None`。
pub fn get_config() -> Option<&'static ApplicationConfig> {
    CONFIG.get()
}

/// 初始化配置（在應用程序啟動時調用）
pub fn init_config() -> Result<&'static ApplicationConfig, ConfigLoadError> {
    let app_config = ApplicationConfig::load_from_env()?;

    if CONFIG.set(app_config).is_err() {
        warn!("配置已經被初始化，跳過重複初始化");
    } else {
        debug!("配置初始化成功，環境：{:?}", Environment::from_env());
    }

    CONFIG
        .get()
        .ok_or_else(|| ConfigLoadError::Source(ConfigError::NotFound("全局配置".to_string())))
}

impl ApplicationConfig {
    /// 從環境變數指定的環境加載配置
    pub fn load_from_env() -> Result<Self, ConfigLoadError> {
        let env = Environment::from_env();
        debug!("從環境加載配置: {:?}", env);
        Self::load(env)
    }

    /// 從指定環境加載配置
    pub fn load(env: Environment) -> Result<Self, ConfigLoadError> {
        Self::load_from_dir(&ConfigLoader::config_dir(), env)
    }

    /// 從指定目錄加載並驗證配置
    pub fn load_from_dir(dir: &Path, env: Environment) -> Result<Self, ConfigLoadError> {
        let config_source = ConfigLoader::load_from_dir(dir, env)?;
        let app_config: ApplicationConfig = config_source.try_deserialize()?;
        app_config.validate()?;
        debug!("配置驗證通過");
        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::SerializerKind;
    use assert_matches::assert_matches;
    use serial_test::serial;

    const VALID: &str = r#"
[cache]
memory_enabled = true
memory_capacity_bytes = 1048576
memory_ttl_secs = 60
remote_enabled = false
remote_ttl_secs = 3600
cache_absence = true
absence_ttl_secs = 30
serializer = "bincode_deflate"

[redis]
url = "redis://localhost:6379"
pool_size = 4
connection_timeout_secs = 5
recycle_timeout_secs = 60

[log]
level = "debug"
format = "json"
"#;

    #[test]
    #[serial]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("production.toml"), VALID).unwrap();

        let config = ApplicationConfig::load_from_dir(dir.path(), Environment::Production).unwrap();
        assert!(config.cache.memory_enabled);
        assert!(!config.cache.remote_enabled);
        assert_eq!(config.cache.memory_ttl_secs, 60);
        assert_eq!(config.cache.serializer, SerializerKind::BincodeDeflate);
        assert_eq!(config.redis.pool_size, 4);
        assert_eq!(config.log.format, "json");
        assert_eq!(config.log.directory, None);
    }

    #[test]
    #[serial]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let invalid = VALID.replace("level = \"debug\"", "level = \"verbose\"");
        std::fs::write(dir.path().join("development.toml"), invalid).unwrap();

        let result = ApplicationConfig::load_from_dir(dir.path(), Environment::Development);
        assert_matches!(result, Err(ConfigLoadError::Validation(_)));
    }

    #[test]
    #[serial]
    fn test_missing_file_is_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ApplicationConfig::load_from_dir(dir.path(), Environment::Development);
        assert_matches!(result, Err(ConfigLoadError::Source(_)));
    }
}
