use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;
use crate::serializer::Serializer;

/// serde_json 序列化器（預設）
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(data).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_map_value() {
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 1.5f64);
        let data = JsonSerializer.marshal(&scores).unwrap();
        let decoded: HashMap<String, f64> = JsonSerializer.unmarshal(&data).unwrap();
        assert_eq!(decoded, scores);
    }

    #[test]
    fn test_json_invalid_input() {
        let result: Result<u32, _> = JsonSerializer.unmarshal(b"not-json");
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }
}
