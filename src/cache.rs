//! 分層快取核心
//!
//! 組合內存層、遠端層、序列化器、TTL 策略與請求合併，
//! 對外提供 Get / MGet / Set / MSet / Delete 與類型化的包裝。

pub mod builder;
pub(crate) mod codec;
pub(crate) mod coalescer;
pub(crate) mod entry;
pub mod keys;
pub mod layered;
pub mod metrics;
pub mod options;
pub mod policy;
pub mod stats;
pub mod target;
pub mod typed;

pub use builder::CacheBuilder;
pub use keys::{build_key, CacheId, KeyBuilder};
pub use layered::LayeredCache;
pub use metrics::{CacheMetrics, Layer, MetricType, METRIC_NAMESPACE};
pub use options::{BatchLoadFuture, BatchLoader, GetOptions, LoadFuture, Loader, SetOptions};
pub use policy::{
    resolve_load_ttl, resolve_set_ttl, should_cache_absence, CachePolicy, TtlOverrides,
};
pub use stats::CacheStats;
pub use target::MGetTarget;
pub use typed::{TypedBatchLoader, TypedCache, TypedGetOptions, TypedLoader};
