//! 單次呼叫的選項
//!
//! 所有覆蓋值都在任何 I/O 之前驗證。

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::policy::TtlOverrides;
use crate::context::CallContext;
use crate::error::CacheError;

/// 單鍵載入器的返回值；`Ok(None)` 或 `Err(CacheError::NotFound)` 表示缺失
pub type LoadFuture<T> = BoxFuture<'static, Result<Option<T>, CacheError>>;

/// 單鍵載入器
pub type Loader<T> = Arc<dyn Fn(CallContext, String) -> LoadFuture<T> + Send + Sync>;

/// 批量載入器的返回值；結果中沒有的鍵視為缺失
pub type BatchLoadFuture<T> = BoxFuture<'static, Result<HashMap<String, T>, CacheError>>;

/// 批量載入器
pub type BatchLoader<T> = Arc<dyn Fn(CallContext, Vec<String>) -> BatchLoadFuture<T> + Send + Sync>;

/// 讀取選項
pub struct GetOptions<T> {
    pub(crate) loader: Option<Loader<T>>,
    pub(crate) batch_loader: Option<BatchLoader<T>>,
    pub(crate) overrides: TtlOverrides,
}

impl<T> Default for GetOptions<T> {
    fn default() -> Self {
        Self {
            loader: None,
            batch_loader: None,
            overrides: TtlOverrides::default(),
        }
    }
}

impl<T> Clone for GetOptions<T> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            batch_loader: self.batch_loader.clone(),
            overrides: self.overrides,
        }
    }
}

impl<T> fmt::Debug for GetOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetOptions")
            .field("loader", &self.loader.is_some())
            .field("batch_loader", &self.batch_loader.is_some())
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl<T> GetOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 設置單鍵載入器
    pub fn loader<F, Fut>(mut self, loader: F) -> Self
    where
        T: 'static,
        F: Fn(CallContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, CacheError>> + Send + 'static,
    {
        self.loader = Some(Arc::new(
            move |ctx: CallContext, key: String| -> LoadFuture<T> { Box::pin(loader(ctx, key)) },
        ));
        self
    }

    /// 設置批量載入器
    pub fn batch_loader<F, Fut>(mut self, loader: F) -> Self
    where
        T: 'static,
        F: Fn(CallContext, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HashMap<String, T>, CacheError>> + Send + 'static,
    {
        self.batch_loader = Some(Arc::new(
            move |ctx: CallContext, keys: Vec<String>| -> BatchLoadFuture<T> {
                Box::pin(loader(ctx, keys))
            },
        ));
        self
    }

    /// 同時覆蓋兩層的 TTL
    pub fn ttl(mut self, memory: Duration, remote: Duration) -> Self {
        self.overrides.memory_ttl = Some(memory);
        self.overrides.remote_ttl = Some(remote);
        self
    }

    pub fn memory_ttl(mut self, ttl: Duration) -> Self {
        self.overrides.memory_ttl = Some(ttl);
        self
    }

    pub fn remote_ttl(mut self, ttl: Duration) -> Self {
        self.overrides.remote_ttl = Some(ttl);
        self
    }

    /// 覆蓋缺失值快取策略
    pub fn cache_absence(mut self, enabled: bool, ttl: Duration) -> Self {
        self.overrides.cache_absence = Some(enabled);
        self.overrides.absence_ttl = Some(ttl);
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        self.overrides.validate()
    }
}

/// 寫入選項
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub(crate) overrides: TtlOverrides,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, memory: Duration, remote: Duration) -> Self {
        self.overrides.memory_ttl = Some(memory);
        self.overrides.remote_ttl = Some(remote);
        self
    }

    pub fn memory_ttl(mut self, ttl: Duration) -> Self {
        self.overrides.memory_ttl = Some(ttl);
        self
    }

    pub fn remote_ttl(mut self, ttl: Duration) -> Self {
        self.overrides.remote_ttl = Some(ttl);
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        self.overrides.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_zero_overrides_rejected() {
        let opts = GetOptions::<String>::new().memory_ttl(Duration::ZERO);
        assert_matches!(opts.validate(), Err(CacheError::InvalidMemoryTtl));

        let opts = GetOptions::<String>::new().cache_absence(true, Duration::ZERO);
        assert_matches!(opts.validate(), Err(CacheError::InvalidAbsenceTtl));

        let opts = SetOptions::new().ttl(Duration::from_secs(1), Duration::ZERO);
        assert_matches!(opts.validate(), Err(CacheError::InvalidRemoteTtl));
    }

    #[tokio::test]
    async fn test_loader_is_boxed_and_shared() {
        let opts = GetOptions::<u32>::new().loader(|_ctx, key| async move {
            Ok(Some(key.len() as u32))
        });
        let cloned = opts.clone();
        let loader = cloned.loader.expect("loader set");
        let value = loader(CallContext::background(), "abcd".to_string()).await;
        assert_eq!(value.unwrap(), Some(4));
        assert!(format!("{:?}", opts).contains("loader: true"));
    }
}
