//! 序列化模組
//!
//! 負責將快取值編碼為位元組與解碼回來。
//! 快取核心只依賴 [`Serializer`] trait，具體實現可在建構時替換。

pub mod compressed;
pub mod json;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

pub use compressed::CompressedBincodeSerializer;
pub use json::JsonSerializer;

/// 序列化器接口
pub trait Serializer: Send + Sync + 'static {
    /// 將值編碼為位元組
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheError>;

    /// 從位元組解碼值
    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CacheError>;
}

/// 可配置的序列化器種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializerKind {
    #[default]
    Json,
    BincodeDeflate,
}

impl SerializerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::Json => "json",
            SerializerKind::BincodeDeflate => "bincode_deflate",
        }
    }
}

/// 依配置在執行期選擇的序列化器
#[derive(Debug, Clone)]
pub enum ConfiguredSerializer {
    Json(JsonSerializer),
    BincodeDeflate(CompressedBincodeSerializer),
}

impl From<SerializerKind> for ConfiguredSerializer {
    fn from(kind: SerializerKind) -> Self {
        match kind {
            SerializerKind::Json => ConfiguredSerializer::Json(JsonSerializer),
            SerializerKind::BincodeDeflate => {
                ConfiguredSerializer::BincodeDeflate(CompressedBincodeSerializer::default())
            }
        }
    }
}

impl Serializer for ConfiguredSerializer {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        match self {
            ConfiguredSerializer::Json(s) => s.marshal(value),
            ConfiguredSerializer::BincodeDeflate(s) => s.marshal(value),
        }
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CacheError> {
        match self {
            ConfiguredSerializer::Json(s) => s.unmarshal(data),
            ConfiguredSerializer::BincodeDeflate(s) => s.unmarshal(data),
        }
    }
}
