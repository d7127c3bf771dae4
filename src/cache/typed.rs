//! 類型化快取
//!
//! 在字串鍵的 [`LayeredCache`] 之上，以 `prefix:id` 形式構建鍵，
//! 並將以 ID 為參數的載入器轉換為以鍵為參數的載入器。

use futures::future::BoxFuture;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys::{build_key, CacheId};
use crate::cache::layered::LayeredCache;
use crate::cache::options::{GetOptions, LoadFuture, SetOptions};
use crate::cache::policy::TtlOverrides;
use crate::context::CallContext;
use crate::error::CacheError;
use crate::serializer::{JsonSerializer, Serializer};

/// 以 ID 為參數的載入器
pub type TypedLoader<ID, T> = Arc<dyn Fn(CallContext, ID) -> LoadFuture<T> + Send + Sync>;

/// 以 ID 列表為參數的批量載入器
pub type TypedBatchLoader<ID, T> = Arc<
    dyn Fn(CallContext, Vec<ID>) -> BoxFuture<'static, Result<HashMap<ID, T>, CacheError>>
        + Send
        + Sync,
>;

/// 類型化讀取選項
pub struct TypedGetOptions<ID, T> {
    loader: Option<TypedLoader<ID, T>>,
    batch_loader: Option<TypedBatchLoader<ID, T>>,
    overrides: TtlOverrides,
}

impl<ID, T> Default for TypedGetOptions<ID, T> {
    fn default() -> Self {
        Self {
            loader: None,
            batch_loader: None,
            overrides: TtlOverrides::default(),
        }
    }
}

impl<ID, T> Clone for TypedGetOptions<ID, T> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            batch_loader: self.batch_loader.clone(),
            overrides: self.overrides,
        }
    }
}

impl<ID, T> fmt::Debug for TypedGetOptions<ID, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedGetOptions")
            .field("loader", &self.loader.is_some())
            .field("batch_loader", &self.batch_loader.is_some())
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl<ID: 'static, T: 'static> TypedGetOptions<ID, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(CallContext, ID) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, CacheError>> + Send + 'static,
    {
        self.loader = Some(Arc::new(
            move |ctx: CallContext, id: ID| -> LoadFuture<T> { Box::pin(loader(ctx, id)) },
        ));
        self
    }

    pub fn batch_loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(CallContext, Vec<ID>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HashMap<ID, T>, CacheError>> + Send + 'static,
    {
        self.batch_loader = Some(Arc::new(
            move |ctx: CallContext,
                  ids: Vec<ID>|
                  -> BoxFuture<'static, Result<HashMap<ID, T>, CacheError>> {
                Box::pin(loader(ctx, ids))
            },
        ));
        self
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

    pub fn cache_absence(mut self, enabled: bool, ttl: Duration) -> Self {
        self.overrides.cache_absence = Some(enabled);
        self.overrides.absence_ttl = Some(ttl);
        self
    }
}

/// 一次批量呼叫期間的鍵與 ID 對照表
struct KeyTable<ID> {
    ids_by_key: FxHashMap<String, ID>,
    keys_by_id: FxHashMap<ID, String>,
}

impl<ID: CacheId> KeyTable<ID> {
    fn new(prefix: &str, ids: &[ID]) -> Self {
        let mut ids_by_key = FxHashMap::default();
        let mut keys_by_id = FxHashMap::default();
        for id in ids {
            let key = build_key(prefix, id);
            ids_by_key.insert(key.clone(), id.clone());
            keys_by_id.insert(id.clone(), key);
        }
        Self {
            ids_by_key,
            keys_by_id,
        }
    }

    fn keys(&self, ids: &[ID]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.keys_by_id.get(id).cloned())
            .collect()
    }
}

/// 類型化快取
pub struct TypedCache<ID, T, S: Serializer = JsonSerializer> {
    cache: LayeredCache<S>,
    _marker: PhantomData<fn() -> (ID, T)>,
}

impl<ID, T, S: Serializer> Clone for TypedCache<ID, T, S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            _marker: PhantomData,
        }
    }
}

impl<ID, T, S> TypedCache<ID, T, S>
where
    ID: CacheId,
    T: Serialize + DeserializeOwned + Send + 'static,
    S: Serializer,
{
    pub fn new(cache: LayeredCache<S>) -> Self {
        Self {
            cache,
            _marker: PhantomData,
        }
    }

    /// 底層的字串鍵快取
    pub fn inner(&self) -> &LayeredCache<S> {
        &self.cache
    }

    pub async fn get(
        &self,
        ctx: &CallContext,
        prefix: &str,
        id: &ID,
        opts: TypedGetOptions<ID, T>,
    ) -> Result<T, CacheError> {
        let key = build_key(prefix, id);
        let mut get_opts = GetOptions::<T> {
            overrides: opts.overrides,
            ..Default::default()
        };
        if let Some(loader) = opts.loader {
            let id = id.clone();
            get_opts = get_opts.loader(move |ctx, _key| loader(ctx, id.clone()));
        }
        self.cache.get(ctx, &key, get_opts).await
    }

    /// 批量讀取，結果以 ID 為鍵，沒有值的 ID 不會出現
    pub async fn mget(
        &self,
        ctx: &CallContext,
        prefix: &str,
        ids: &[ID],
        opts: TypedGetOptions<ID, T>,
    ) -> Result<HashMap<ID, T>, CacheError> {
        let table = Arc::new(KeyTable::new(prefix, ids));
        let keys = table.keys(ids);

        let mut get_opts = GetOptions::<T> {
            overrides: opts.overrides,
            ..Default::default()
        };
        if let Some(loader) = opts.batch_loader {
            let table = Arc::clone(&table);
            get_opts = get_opts.batch_loader(move |ctx, keys: Vec<String>| {
                let ids = keys
                    .iter()
                    .filter_map(|key| table.ids_by_key.get(key).cloned())
                    .collect();
                let load = loader(ctx, ids);
                let table = Arc::clone(&table);
                async move {
                    let by_id = load.await?;
                    Ok::<_, CacheError>(
                        by_id
                            .into_iter()
                            .filter_map(|(id, value)| {
                                table.keys_by_id.get(&id).map(|key| (key.clone(), value))
                            })
                            .collect::<HashMap<String, T>>(),
                    )
                }
            });
        }

        let by_key = self.cache.mget_map(ctx, keys.as_slice(), get_opts).await?;
        Ok(by_key
            .into_iter()
            .filter_map(|(key, value)| table.ids_by_key.get(&key).map(|id| (id.clone(), value)))
            .collect())
    }

    pub async fn set(
        &self,
        ctx: &CallContext,
        prefix: &str,
        id: &ID,
        value: &T,
        opts: SetOptions,
    ) -> Result<(), CacheError> {
        self.cache.set(ctx, &build_key(prefix, id), value, opts).await
    }

    pub async fn mset<I>(
        &self,
        ctx: &CallContext,
        prefix: &str,
        items: I,
        opts: SetOptions,
    ) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (ID, T)>,
    {
        let items: Vec<(String, T)> = items
            .into_iter()
            .map(|(id, value)| (build_key(prefix, &id), value))
            .collect();
        self.cache.mset(ctx, items, opts).await
    }

    pub async fn delete(&self, ctx: &CallContext, prefix: &str, id: &ID) -> Result<(), CacheError> {
        self.cache.delete(ctx, &build_key(prefix, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_table_maps_both_ways() {
        let table = KeyTable::new("order", &[3u64, 1, 3]);
        assert_eq!(table.keys(&[3, 1]), vec!["order:3", "order:1"]);
        assert_eq!(table.ids_by_key.get("order:1"), Some(&1));
        assert_eq!(table.ids_by_key.len(), 2);
    }
}
