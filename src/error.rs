//! 快取錯誤類型
//!
//! 分為四類：配置錯誤、驗證錯誤、缺失值（正常的「查無此鍵」結果）、
//! 以及原樣透傳的存儲層與載入器錯誤。

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

use crate::redis::pool::RedisPoolError;

/// 存儲層（L1 / L2）錯誤
///
/// 只保存錯誤訊息字串，使其可以 `Clone`，
/// 以便合併請求時所有等待者共享同一個結果。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 鍵不存在（僅用於 TTL 查詢）
    #[error("鍵不存在: {0}")]
    NotFound(String),

    /// 連接錯誤
    #[error("存儲連接錯誤: {0}")]
    Connection(String),

    /// 命令執行錯誤
    #[error("存儲命令錯誤: {0}")]
    Command(String),

    /// 連接池錯誤
    #[error("存儲連接池錯誤: {0}")]
    Pool(String),

    /// 其他錯誤
    #[error("存儲其他錯誤: {0}")]
    Other(String),
}

impl From<RedisPoolError> for StoreError {
    fn from(error: RedisPoolError) -> Self {
        StoreError::Pool(error.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for StoreError {
    fn from(error: deadpool_redis::redis::RedisError) -> Self {
        if error.is_connection_dropped() || error.is_connection_refusal() || error.is_io_error() {
            StoreError::Connection(error.to_string())
        } else {
            StoreError::Command(error.to_string())
        }
    }
}

/// 快取操作錯誤
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// 未配置任何快取層
    #[error("至少需要配置一個快取層（內存或遠端）")]
    NoTierConfigured,

    /// 內存快取過期時間無效
    #[error("無效的內存快取過期時間（必須大於 0）")]
    InvalidMemoryTtl,

    /// 遠端快取過期時間無效
    #[error("無效的遠端快取過期時間（必須大於 0）")]
    InvalidRemoteTtl,

    /// 缺失值快取過期時間無效
    #[error("無效的缺失值快取過期時間（必須大於 0）")]
    InvalidAbsenceTtl,

    /// MGet 的目標容器無效
    #[error("無效的 MGet 目標容器：必須是以字串為鍵的映射")]
    InvalidMGetTarget,

    /// 快取未命中且無法載入
    #[error("鍵不存在")]
    NotFound,

    /// 存儲層錯誤（原樣透傳）
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 載入器錯誤（原樣透傳）
    #[error(transparent)]
    Loader(Arc<dyn StdError + Send + Sync>),

    /// 序列化錯誤
    #[error("數據序列化錯誤: {0}")]
    Serialization(String),

    /// 反序列化錯誤
    #[error("數據反序列化錯誤: {0}")]
    Deserialization(String),

    /// 存儲的條目格式損壞
    #[error("快取條目格式損壞: {0}")]
    CorruptEntry(String),

    /// 呼叫已被取消
    #[error("操作已取消")]
    Cancelled,

    /// 呼叫超過截止時間
    #[error("操作超過截止時間")]
    DeadlineExceeded,
}

impl CacheError {
    /// 包裝任意載入器錯誤
    pub fn loader<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        CacheError::Loader(Arc::from(error.into()))
    }

    /// 是否為「鍵不存在」
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}

/// 判斷結果是否為「鍵不存在」
pub fn is_not_found<T>(result: &Result<T, CacheError>) -> bool {
    matches!(result, Err(CacheError::NotFound))
}
