//! 請求合併
//!
//! 同一個鍵同時只有一個載入在執行，其餘呼叫者等待同一個結果。
//! 載入在獨立的 tokio 任務中執行，不依附任何呼叫者：
//! 等待者取消或逾時只會結束自己的等待，載入仍會完成並從登記表移除。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;

use crate::error::CacheError;

pub(crate) type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, CacheError>>>;

/// 載入任務結束（完成、panic 或被丟棄）時從登記表移除對應的鍵
struct Deregister<V: Clone + Send + Sync + 'static> {
    registry: Arc<DashMap<String, SharedLoad<V>>>,
    key: String,
}

impl<V: Clone + Send + Sync + 'static> Drop for Deregister<V> {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

/// 以鍵為單位合併並行的載入
pub(crate) struct Coalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    in_flight: Arc<DashMap<String, SharedLoad<V>>>,
}

impl<V> Coalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// 加入指定鍵的載入；沒有進行中的載入時以 `start` 建立一個並立即在背景執行
    ///
    /// 載入完成時會從登記表移除自己，之後的呼叫會重新載入。
    /// 必須在 tokio 執行環境中呼叫。
    pub(crate) fn join<F>(&self, key: String, start: F) -> SharedLoad<V>
    where
        F: FnOnce() -> BoxFuture<'static, Result<V, CacheError>>,
    {
        match self.in_flight.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let deregister = Deregister {
                    registry: Arc::clone(&self.in_flight),
                    key: entry.key().clone(),
                };
                let load = start();
                // 移除需要分片寫鎖，會等到下面的 insert 完成後才執行
                let handle = tokio::spawn(async move {
                    let _deregister = deregister;
                    load.await
                });
                let shared = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(CacheError::loader(e)),
                    }
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                shared
            }
        }
    }

    /// 進行中的載入數
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// 批量載入的合併鍵
///
/// 排序去重後以長度前綴串接，不同順序的同一組鍵得到相同結果，
/// 含分隔符的鍵也不會互相碰撞。
pub(crate) fn batch_key(keys: &[String]) -> String {
    let mut sorted: Vec<&str> = keys.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut length = itoa::Buffer::new();
    let capacity = sorted.iter().map(|k| k.len() + 8).sum::<usize>() + 6;
    let mut out = String::with_capacity(capacity);
    out.push_str("batch:");
    for key in sorted {
        out.push_str(length.format(key.len()));
        out.push(':');
        out.push_str(key);
    }
    out
}
