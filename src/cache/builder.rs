use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::layered::LayeredCache;
use crate::cache::policy::CachePolicy;
use crate::config::types::CacheConfig;
use crate::error::CacheError;
use crate::serializer::{ConfiguredSerializer, JsonSerializer, Serializer};
use crate::storage::TierStore;

/// 分層快取構建器
///
/// 預設值：內存 TTL 5 分鐘、遠端 TTL 14 天、不快取缺失值、缺失值 TTL 1 分鐘、JSON 序列化。
pub struct CacheBuilder<S: Serializer = JsonSerializer> {
    memory: Option<Arc<dyn TierStore>>,
    remote: Option<Arc<dyn TierStore>>,
    serializer: S,
    policy: CachePolicy,
}

impl CacheBuilder<JsonSerializer> {
    pub fn new() -> Self {
        Self {
            memory: None,
            remote: None,
            serializer: JsonSerializer,
            policy: CachePolicy::default(),
        }
    }
}

impl Default for CacheBuilder<JsonSerializer> {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBuilder<ConfiguredSerializer> {
    /// 依配置套用 TTL、缺失值策略與序列化器
    ///
    /// 存儲層需要另外以 [`CacheBuilder::memory`] / [`CacheBuilder::remote`] 提供。
    pub fn from_config(config: &CacheConfig) -> Self {
        CacheBuilder::new()
            .serializer(ConfiguredSerializer::from(config.serializer))
            .default_ttl(config.memory_ttl(), config.remote_ttl())
            .default_cache_absence(config.cache_absence, config.absence_ttl())
    }
}

impl<S: Serializer> CacheBuilder<S> {
    /// 設置內存層（L1）
    pub fn memory(mut self, store: impl TierStore) -> Self {
        self.memory = Some(Arc::new(store));
        self
    }

    /// 設置遠端層（L2）
    pub fn remote(mut self, store: impl TierStore) -> Self {
        self.remote = Some(Arc::new(store));
        self
    }

    /// 替換序列化器
    pub fn serializer<S2: Serializer>(self, serializer: S2) -> CacheBuilder<S2> {
        CacheBuilder {
            memory: self.memory,
            remote: self.remote,
            serializer,
            policy: self.policy,
        }
    }

    pub fn default_ttl(mut self, memory: Duration, remote: Duration) -> Self {
        self.policy.memory_ttl = memory;
        self.policy.remote_ttl = remote;
        self
    }

    /// 預設是否快取缺失值以防止快取穿透
    pub fn default_cache_absence(mut self, enabled: bool, ttl: Duration) -> Self {
        self.policy.cache_absence = enabled;
        self.policy.absence_ttl = ttl;
        self
    }

    pub fn build(self) -> Result<LayeredCache<S>, CacheError> {
        if self.memory.is_none() && self.remote.is_none() {
            return Err(CacheError::NoTierConfigured);
        }
        self.policy
            .validate(self.memory.is_some(), self.remote.is_some())?;

        info!(
            memory = self.memory.is_some(),
            remote = self.remote.is_some(),
            memory_ttl = ?self.policy.memory_ttl,
            remote_ttl = ?self.policy.remote_ttl,
            cache_absence = self.policy.cache_absence,
            "分層快取初始化完成"
        );

        Ok(LayeredCache::from_parts(
            self.memory,
            self.remote,
            self.serializer,
            self.policy,
        ))
    }
}
