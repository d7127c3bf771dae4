//! 兩層（內存 + Redis）讀穿/寫穿快取
//!
//! 提供請求合併與缺失值快取（防止快取穿透），
//! 以及建立在字串鍵之上的類型化包裝。

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod redis;
pub mod serializer;
pub mod storage;

pub use cache::{
    CacheBuilder, CacheId, CacheStats, GetOptions, Layer, LayeredCache, MGetTarget, SetOptions,
    TypedCache, TypedGetOptions,
};
pub use context::{CallContext, CancelHandle};
pub use error::{is_not_found, CacheError, StoreError};
pub use serializer::{
    CompressedBincodeSerializer, ConfiguredSerializer, JsonSerializer, Serializer, SerializerKind,
};
pub use storage::{MokaStore, RedisStore, TierStore};
