use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

use crate::error::CacheError;
use crate::serializer::Serializer;

/// 小於此長度的資料不壓縮
pub const COMPRESSION_THRESHOLD: usize = 64;

const NO_COMPRESSION: u8 = 0x0;
const DEFLATE_COMPRESSION: u8 = 0x1;

/// bincode 編碼並在超過門檻時以 deflate 壓縮
///
/// 格式：`payload | method`，最後一個位元組標記壓縮方式。
#[derive(Debug, Clone)]
pub struct CompressedBincodeSerializer {
    threshold: usize,
    level: Compression,
}

impl Default for CompressedBincodeSerializer {
    fn default() -> Self {
        Self {
            threshold: COMPRESSION_THRESHOLD,
            level: Compression::fast(),
        }
    }
}

impl CompressedBincodeSerializer {
    pub fn new(threshold: usize, level: u32) -> Self {
        Self {
            threshold,
            level: Compression::new(level),
        }
    }

    fn compress(&self, mut data: Vec<u8>) -> Result<Vec<u8>, CacheError> {
        if data.len() < self.threshold {
            data.push(NO_COMPRESSION);
            return Ok(data);
        }

        let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2 + 1), self.level);
        encoder
            .write_all(&data)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let mut compressed = encoder
            .finish()
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        compressed.push(DEFLATE_COMPRESSION);
        Ok(compressed)
    }
}

impl Serializer for CompressedBincodeSerializer {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.compress(encoded)
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CacheError> {
        let Some((&method, payload)) = data.split_last() else {
            return Err(CacheError::Deserialization("空的資料".to_string()));
        };

        let decompressed;
        let payload = match method {
            NO_COMPRESSION => payload,
            DEFLATE_COMPRESSION => {
                let mut buffer = Vec::with_capacity(payload.len() * 2);
                DeflateDecoder::new(payload)
                    .read_to_end(&mut buffer)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                decompressed = buffer;
                &decompressed[..]
            }
            other => {
                return Err(CacheError::Deserialization(format!(
                    "未知的壓縮方式: {:#x}",
                    other
                )))
            }
        };

        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map(|(value, _)| value)
            .map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Bar {
        instrument_id: i32,
        closes: Vec<f64>,
    }

    #[test]
    fn test_small_payload_is_not_compressed() {
        let serializer = CompressedBincodeSerializer::default();
        let data = serializer.marshal(&42u32).unwrap();
        assert_eq!(*data.last().unwrap(), NO_COMPRESSION);
        assert_eq!(serializer.unmarshal::<u32>(&data).unwrap(), 42);
    }

    #[test]
    fn test_large_payload_is_compressed() {
        let serializer = CompressedBincodeSerializer::default();
        let bar = Bar {
            instrument_id: 100,
            closes: vec![104.5; 256],
        };
        let data = serializer.marshal(&bar).unwrap();
        assert_eq!(*data.last().unwrap(), DEFLATE_COMPRESSION);
        // 重複的數據應該明顯變小
        assert!(data.len() < 256 * 8);
        assert_eq!(serializer.unmarshal::<Bar>(&data).unwrap(), bar);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let serializer = CompressedBincodeSerializer::default();
        let result = serializer.unmarshal::<u32>(&[1, 2, 0x7f]);
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
        assert!(serializer.unmarshal::<u32>(&[]).is_err());
    }
}
