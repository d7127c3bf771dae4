//! 分層快取
//!
//! 讀取依序查詢內存層（L1）與遠端層（L2），L2 命中時回寫 L1；
//! 兩層都未命中且提供了載入器時，經請求合併後只載入一次並寫入兩層。
//! 寫入時先寫 L1 再寫 L2，兩層之間沒有原子性保證。

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::cache::builder::CacheBuilder;
use crate::cache::coalescer::{batch_key, Coalescer};
use crate::cache::codec;
use crate::cache::entry::{self, Entry};
use crate::cache::metrics::{CacheMetrics, Layer, MetricType};
use crate::cache::options::{BatchLoader, GetOptions, Loader, SetOptions};
use crate::cache::policy::{
    resolve_load_ttl, resolve_set_ttl, should_cache_absence, CachePolicy, TtlOverrides,
};
use crate::cache::stats::CacheStats;
use crate::cache::target::MGetTarget;
use crate::context::CallContext;
use crate::error::{CacheError, StoreError};
use crate::serializer::{JsonSerializer, Serializer};
use crate::storage::TierStore;

/// 兩層快取
///
/// 可以低成本複製，所有複本共享同一組存儲與請求合併登記表。
pub struct LayeredCache<S: Serializer = JsonSerializer> {
    inner: Arc<Inner<S>>,
}

impl<S: Serializer> Clone for LayeredCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Serializer> std::fmt::Debug for LayeredCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredCache").finish_non_exhaustive()
    }
}

struct Inner<S> {
    memory: Option<Arc<dyn TierStore>>,
    remote: Option<Arc<dyn TierStore>>,
    serializer: S,
    policy: CachePolicy,
    single_flight: Coalescer<Arc<Vec<u8>>>,
    batch_flight: Coalescer<Arc<HashMap<String, Vec<u8>>>>,
}

impl LayeredCache<JsonSerializer> {
    /// 建立快取構建器
    pub fn builder() -> CacheBuilder<JsonSerializer> {
        CacheBuilder::new()
    }
}

impl<S: Serializer> LayeredCache<S> {
    pub(crate) fn from_parts(
        memory: Option<Arc<dyn TierStore>>,
        remote: Option<Arc<dyn TierStore>>,
        serializer: S,
        policy: CachePolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                memory,
                remote,
                serializer,
                policy,
                single_flight: Coalescer::new(),
                batch_flight: Coalescer::new(),
            }),
        }
    }

    /// 實例的預設策略
    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_enabled: self.inner.memory.is_some(),
            remote_enabled: self.inner.remote.is_some(),
            in_flight_loads: self.inner.single_flight.in_flight(),
            in_flight_batch_loads: self.inner.batch_flight.in_flight(),
        }
    }

    /// 讀取單個鍵
    ///
    /// 未命中且沒有載入器、或載入器回報缺失時返回 [`CacheError::NotFound`]。
    pub async fn get<T>(
        &self,
        ctx: &CallContext,
        key: &str,
        opts: GetOptions<T>,
    ) -> Result<T, CacheError>
    where
        T: Serialize + serde::de::DeserializeOwned + Send + 'static,
    {
        opts.validate()?;
        let started = Instant::now();
        let result = self.get_inner(ctx, key, opts).await;
        Self::finish("get", started, &result);
        result
    }

    async fn get_inner<T>(
        &self,
        ctx: &CallContext,
        key: &str,
        opts: GetOptions<T>,
    ) -> Result<T, CacheError>
    where
        T: Serialize + serde::de::DeserializeOwned + Send + 'static,
    {
        let inner = &self.inner;

        if let Some(memory) = &inner.memory {
            if let Some(raw) = ctx.run(memory.get(key)).await? {
                return match entry::decode(key, &raw)? {
                    Entry::Present(payload) => {
                        CacheMetrics::record(MetricType::Hit { layer: Layer::Memory }, None);
                        debug!(key, layer = "memory", "快取命中");
                        codec::decode(&inner.serializer, payload)
                    }
                    Entry::Absent => {
                        CacheMetrics::record(MetricType::AbsenceHit { layer: Layer::Memory }, None);
                        debug!(key, layer = "memory", "命中缺失值標記");
                        Err(CacheError::NotFound)
                    }
                };
            }
        }

        if let Some(remote) = &inner.remote {
            if let Some(raw) = ctx.run(remote.get(key)).await? {
                let payload = match entry::decode(key, &raw)? {
                    Entry::Present(payload) => payload,
                    Entry::Absent => {
                        // 缺失值標記不回寫內存層
                        CacheMetrics::record(MetricType::AbsenceHit { layer: Layer::Remote }, None);
                        debug!(key, layer = "remote", "命中缺失值標記");
                        return Err(CacheError::NotFound);
                    }
                };
                CacheMetrics::record(MetricType::Hit { layer: Layer::Remote }, None);
                debug!(key, layer = "remote", "快取命中");

                let value = codec::decode(&inner.serializer, payload)?;
                if let Some(memory) = &inner.memory {
                    let (memory_ttl, _) = resolve_load_ttl(&opts.overrides, &inner.policy, false);
                    let write_back = ctx.run(memory.set(key, raw.clone(), memory_ttl)).await;
                    Self::tolerate_write_back(key, write_back)?;
                }
                return Ok(value);
            }
        }

        CacheMetrics::record(MetricType::Miss, None);
        let Some(loader) = opts.loader else {
            debug!(key, "快取未命中且沒有載入器");
            return Err(CacheError::NotFound);
        };

        let payload = self.load_one(ctx, key, loader, opts.overrides).await?;
        codec::decode(&inner.serializer, &payload)
    }

    async fn load_one<T>(
        &self,
        ctx: &CallContext,
        key: &str,
        loader: Loader<T>,
        overrides: TtlOverrides,
    ) -> Result<Arc<Vec<u8>>, CacheError>
    where
        T: Serialize + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        // 合併後的載入由所有等待者共享，不受任何單一呼叫者的取消或截止時間影響
        let load_ctx = CallContext::background();
        let load_key = key.to_string();
        let shared = self.inner.single_flight.join(key.to_string(), move || {
            async move {
                inner
                    .load_and_store(&load_ctx, &load_key, loader, overrides)
                    .await
                    .map(Arc::new)
            }
            .boxed()
        });
        ctx.run(shared).await
    }

    /// 批量讀取
    ///
    /// 結果寫入 `target`（原有內容會被取代），沒有值的鍵不會出現在結果中。
    pub async fn mget<M, K>(
        &self,
        ctx: &CallContext,
        keys: &[K],
        target: &mut M,
        opts: GetOptions<M::Value>,
    ) -> Result<(), CacheError>
    where
        M: MGetTarget,
        K: AsRef<str>,
    {
        opts.validate()?;
        target.validate()?;
        if keys.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let result = self.mget_inner(ctx, keys, target, opts).await;
        CacheMetrics::record(
            MetricType::Batch {
                operation: "mget",
                count: keys.len(),
            },
            None,
        );
        Self::finish("mget", started, &result);
        result
    }

    /// 批量讀取到新的 `HashMap`
    pub async fn mget_map<T, K>(
        &self,
        ctx: &CallContext,
        keys: &[K],
        opts: GetOptions<T>,
    ) -> Result<HashMap<String, T>, CacheError>
    where
        T: Serialize + serde::de::DeserializeOwned + Send + 'static,
        K: AsRef<str>,
    {
        let mut target = HashMap::with_capacity(keys.len());
        self.mget(ctx, keys, &mut target, opts).await?;
        Ok(target)
    }

    async fn mget_inner<M, K>(
        &self,
        ctx: &CallContext,
        keys: &[K],
        target: &mut M,
        opts: GetOptions<M::Value>,
    ) -> Result<(), CacheError>
    where
        M: MGetTarget,
        K: AsRef<str>,
    {
        let inner = &self.inner;

        let mut seen = HashSet::with_capacity(keys.len());
        let keys: Vec<String> = keys
            .iter()
            .map(|k| k.as_ref())
            .filter(|k| seen.insert(*k))
            .map(str::to_string)
            .collect();

        let mut found: HashMap<String, Vec<u8>> = HashMap::with_capacity(keys.len());
        let mut missing = Vec::with_capacity(keys.len());

        match &inner.memory {
            Some(memory) => {
                let mut batch = ctx.run(memory.batch_get(&keys)).await?;
                for key in keys {
                    match batch.remove(&key) {
                        Some(raw) => {
                            if let Entry::Present(payload) = entry::decode(&key, &raw)? {
                                found.insert(key, payload.to_vec());
                            }
                        }
                        None => missing.push(key),
                    }
                }
                debug!("內存層批量命中 {} 個，未命中 {} 個", found.len(), missing.len());
            }
            None => missing = keys,
        }

        if let (Some(remote), false) = (&inner.remote, missing.is_empty()) {
            let mut batch = ctx.run(remote.batch_get(&missing)).await?;
            let mut write_back = HashMap::new();
            let mut remaining = Vec::new();
            for key in missing {
                match batch.remove(&key) {
                    Some(raw) => {
                        if let Entry::Present(payload) = entry::decode(&key, &raw)? {
                            found.insert(key.clone(), payload.to_vec());
                            if inner.memory.is_some() {
                                write_back.insert(key, raw);
                            }
                        }
                    }
                    None => remaining.push(key),
                }
            }

            if let (Some(memory), false) = (&inner.memory, write_back.is_empty()) {
                let (memory_ttl, _) = resolve_load_ttl(&opts.overrides, &inner.policy, false);
                let count = write_back.len();
                let result = ctx.run(memory.batch_set(write_back, memory_ttl)).await;
                Self::tolerate_write_back(&format!("{} 個鍵", count), result)?;
            }
            missing = remaining;
        }

        if !missing.is_empty() {
            CacheMetrics::record(MetricType::Miss, None);
            if let Some(loader) = opts.batch_loader {
                let loaded = self.load_batch(ctx, missing, loader, opts.overrides).await?;
                for (key, payload) in loaded.iter() {
                    found.insert(key.clone(), payload.clone());
                }
            }
        }

        let mut decoded = Vec::with_capacity(found.len());
        for (key, payload) in found {
            let value = codec::decode(&inner.serializer, &payload)?;
            decoded.push((key, value));
        }

        target.reset();
        for (key, value) in decoded {
            target.insert(key, value);
        }
        Ok(())
    }

    async fn load_batch<T>(
        &self,
        ctx: &CallContext,
        missing: Vec<String>,
        loader: BatchLoader<T>,
        overrides: TtlOverrides,
    ) -> Result<Arc<HashMap<String, Vec<u8>>>, CacheError>
    where
        T: Serialize + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let load_ctx = CallContext::background();
        let shared = self.inner.batch_flight.join(batch_key(&missing), move || {
            async move {
                inner
                    .batch_load_and_store(&load_ctx, missing, loader, overrides)
                    .await
                    .map(Arc::new)
            }
            .boxed()
        });
        ctx.run(shared).await
    }

    /// 寫入單個鍵到所有已配置的層
    pub async fn set<V>(
        &self,
        ctx: &CallContext,
        key: &str,
        value: &V,
        opts: SetOptions,
    ) -> Result<(), CacheError>
    where
        V: Serialize + Any,
    {
        opts.validate()?;
        let started = Instant::now();
        let payload = codec::encode(&self.inner.serializer, value)?;
        let (memory_ttl, remote_ttl) = resolve_set_ttl(&opts.overrides, &self.inner.policy);
        let result = self
            .inner
            .write_through(ctx, key, entry::present(&payload), memory_ttl, remote_ttl, "set")
            .await;
        Self::finish("set", started, &result);
        result
    }

    /// 批量寫入，每層只寫一次
    pub async fn mset<I, K, V>(
        &self,
        ctx: &CallContext,
        items: I,
        opts: SetOptions,
    ) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize + Any,
    {
        opts.validate()?;
        let mut values = HashMap::new();
        for (key, value) in items {
            let payload = codec::encode(&self.inner.serializer, &value)?;
            values.insert(key.into(), entry::present(&payload));
        }
        if values.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let count = values.len();
        let (memory_ttl, remote_ttl) = resolve_set_ttl(&opts.overrides, &self.inner.policy);
        let result = self
            .inner
            .batch_write_through(ctx, values, memory_ttl, remote_ttl, "mset")
            .await;
        CacheMetrics::record(
            MetricType::Batch {
                operation: "mset",
                count,
            },
            None,
        );
        Self::finish("mset", started, &result);
        result
    }

    /// 從兩層刪除
    pub async fn delete(&self, ctx: &CallContext, key: &str) -> Result<(), CacheError> {
        if let Some(memory) = &self.inner.memory {
            ctx.run(memory.delete(key)).await?;
        }
        if let Some(remote) = &self.inner.remote {
            if let Err(e) = ctx.run(remote.delete(key)).await {
                self.inner.report_partial_write(key, "delete", &e);
                return Err(e);
            }
        }
        debug!(key, "快取已刪除");
        Ok(())
    }

    /// 查詢指定層上的剩餘存活時間
    ///
    /// 該層未配置時返回 [`CacheError::NoTierConfigured`]，鍵不存在時返回 [`CacheError::NotFound`]。
    pub async fn ttl(
        &self,
        ctx: &CallContext,
        key: &str,
        layer: Layer,
    ) -> Result<Option<Duration>, CacheError> {
        let store = match layer {
            Layer::Memory => self.inner.memory.as_ref(),
            Layer::Remote => self.inner.remote.as_ref(),
        }
        .ok_or(CacheError::NoTierConfigured)?;

        match ctx.run(store.ttl(key)).await {
            Err(CacheError::Store(StoreError::NotFound(_))) => Err(CacheError::NotFound),
            other => other,
        }
    }

    fn tolerate_write_back(target: &str, result: Result<usize, CacheError>) -> Result<(), CacheError> {
        match result {
            Ok(_) => Ok(()),
            Err(e @ (CacheError::Cancelled | CacheError::DeadlineExceeded)) => Err(e),
            Err(e) => {
                warn!("回寫內存層失敗 [{}]: {}", target, e);
                Ok(())
            }
        }
    }

    fn finish<T>(operation: &'static str, started: Instant, result: &Result<T, CacheError>) {
        CacheMetrics::record(MetricType::Latency { operation }, Some(started.elapsed()));
        if let Err(e) = result {
            if !e.is_not_found() {
                CacheMetrics::record(MetricType::Error { operation }, None);
            }
        }
    }
}

impl<S: Serializer> Inner<S> {
    async fn load_and_store<T>(
        &self,
        ctx: &CallContext,
        key: &str,
        loader: Loader<T>,
        overrides: TtlOverrides,
    ) -> Result<Vec<u8>, CacheError>
    where
        T: Serialize + Send + 'static,
    {
        let started = Instant::now();
        let loaded = match ctx.run(loader(ctx.clone(), key.to_string())).await {
            Ok(value) => value,
            Err(CacheError::NotFound) => None,
            Err(e) => return Err(e),
        };
        CacheMetrics::record(MetricType::Load { batch: false }, Some(started.elapsed()));

        let Some(value) = loaded else {
            if !should_cache_absence(overrides.cache_absence, self.policy.cache_absence) {
                debug!(key, "載入器回報缺失，不快取");
                return Err(CacheError::NotFound);
            }
            let (memory_ttl, remote_ttl) = resolve_load_ttl(&overrides, &self.policy, true);
            self.write_through(ctx, key, entry::absent(), memory_ttl, remote_ttl, "load")
                .await?;
            CacheMetrics::record(MetricType::AbsenceWrite { count: 1 }, None);
            debug!(key, ttl = ?memory_ttl, "已快取缺失值標記");
            return Err(CacheError::NotFound);
        };

        let payload = codec::encode(&self.serializer, &value)?;
        let (memory_ttl, remote_ttl) = resolve_load_ttl(&overrides, &self.policy, false);
        self.write_through(ctx, key, entry::present(&payload), memory_ttl, remote_ttl, "load")
            .await?;
        debug!(key, "載入並快取完成");
        Ok(payload)
    }

    async fn batch_load_and_store<T>(
        &self,
        ctx: &CallContext,
        keys: Vec<String>,
        loader: BatchLoader<T>,
        overrides: TtlOverrides,
    ) -> Result<HashMap<String, Vec<u8>>, CacheError>
    where
        T: Serialize + Send + 'static,
    {
        let started = Instant::now();
        let mut loaded = match ctx.run(loader(ctx.clone(), keys.clone())).await {
            Ok(values) => values,
            Err(CacheError::NotFound) => HashMap::new(),
            Err(e) => return Err(e),
        };
        CacheMetrics::record(MetricType::Load { batch: true }, Some(started.elapsed()));

        let cache_absence = should_cache_absence(overrides.cache_absence, self.policy.cache_absence);
        let mut payloads = HashMap::with_capacity(loaded.len());
        let mut present = HashMap::with_capacity(loaded.len());
        let mut absent = HashMap::new();

        for key in keys {
            match loaded.remove(&key) {
                Some(value) => {
                    let payload = codec::encode(&self.serializer, &value)?;
                    present.insert(key.clone(), entry::present(&payload));
                    payloads.insert(key, payload);
                }
                None if cache_absence => {
                    absent.insert(key, entry::absent());
                }
                None => {}
            }
        }

        if !present.is_empty() {
            let (memory_ttl, remote_ttl) = resolve_load_ttl(&overrides, &self.policy, false);
            self.batch_write_through(ctx, present, memory_ttl, remote_ttl, "batch_load")
                .await?;
        }

        if !absent.is_empty() {
            let count = absent.len();
            let (memory_ttl, remote_ttl) = resolve_load_ttl(&overrides, &self.policy, true);
            self.batch_write_through(ctx, absent, memory_ttl, remote_ttl, "batch_load")
                .await?;
            CacheMetrics::record(MetricType::AbsenceWrite { count }, None);
        }

        debug!("批量載入完成: 找到 {} 個", payloads.len());
        Ok(payloads)
    }

    async fn write_through(
        &self,
        ctx: &CallContext,
        key: &str,
        raw: Vec<u8>,
        memory_ttl: Duration,
        remote_ttl: Duration,
        operation: &'static str,
    ) -> Result<(), CacheError> {
        if let Some(memory) = &self.memory {
            ctx.run(memory.set(key, raw.clone(), memory_ttl)).await?;
        }
        if let Some(remote) = &self.remote {
            if let Err(e) = ctx.run(remote.set(key, raw, remote_ttl)).await {
                self.report_partial_write(key, operation, &e);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn batch_write_through(
        &self,
        ctx: &CallContext,
        values: HashMap<String, Vec<u8>>,
        memory_ttl: Duration,
        remote_ttl: Duration,
        operation: &'static str,
    ) -> Result<(), CacheError> {
        let count = values.len();
        match (&self.memory, &self.remote) {
            (Some(memory), Some(remote)) => {
                ctx.run(memory.batch_set(values.clone(), memory_ttl)).await?;
                if let Err(e) = ctx.run(remote.batch_set(values, remote_ttl)).await {
                    self.report_partial_write(&format!("{} 個鍵", count), operation, &e);
                    return Err(e);
                }
            }
            (Some(memory), None) => {
                ctx.run(memory.batch_set(values, memory_ttl)).await?;
            }
            (None, Some(remote)) => {
                ctx.run(remote.batch_set(values, remote_ttl)).await?;
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// 內存層已寫入而遠端層失敗，兩層暫時不一致
    fn report_partial_write(&self, target: &str, operation: &'static str, error: &CacheError) {
        if self.memory.is_some() {
            warn!(
                operation,
                "內存層已更新但遠端層失敗，兩層暫時不一致 [{}]: {}", target, error
            );
            CacheMetrics::record_inconsistency(operation);
        }
    }
}
