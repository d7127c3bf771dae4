//! 值與位元組之間的轉換
//!
//! `String`、`&'static str` 與 `Vec<u8>` 直接存取原始位元組，不經過序列化器。

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};

use crate::error::CacheError;
use crate::serializer::Serializer;

/// 將值編碼為位元組
pub(crate) fn encode<S, V>(serializer: &S, value: &V) -> Result<Vec<u8>, CacheError>
where
    S: Serializer,
    V: Serialize + Any,
{
    let any = value as &dyn Any;
    if let Some(s) = any.downcast_ref::<String>() {
        return Ok(s.as_bytes().to_vec());
    }
    if let Some(s) = any.downcast_ref::<&'static str>() {
        return Ok(s.as_bytes().to_vec());
    }
    if let Some(bytes) = any.downcast_ref::<Vec<u8>>() {
        return Ok(bytes.clone());
    }
    serializer.marshal(value)
}

/// 從位元組解碼值
pub(crate) fn decode<S, T>(serializer: &S, payload: &[u8]) -> Result<T, CacheError>
where
    S: Serializer,
    T: DeserializeOwned + Any,
{
    if TypeId::of::<T>() == TypeId::of::<String>() {
        let text = String::from_utf8(payload.to_vec())
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;
        return downcast(Box::new(text));
    }
    if TypeId::of::<T>() == TypeId::of::<Vec<u8>>() {
        return downcast(Box::new(payload.to_vec()));
    }
    serializer.unmarshal(payload)
}

fn downcast<T: Any>(value: Box<dyn Any>) -> Result<T, CacheError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| CacheError::Deserialization("類型轉換失敗".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonSerializer;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    #[test]
    fn test_raw_values_bypass_serializer() {
        let s = JsonSerializer;
        assert_eq!(encode(&s, &"alice".to_string()).unwrap(), b"alice");
        assert_eq!(encode(&s, &"bob").unwrap(), b"bob");
        assert_eq!(encode(&s, &vec![1u8, 2, 3]).unwrap(), vec![1, 2, 3]);

        let text: String = decode(&s, b"alice").unwrap();
        assert_eq!(text, "alice");
        let bytes: Vec<u8> = decode(&s, &[0xff, 0x00]).unwrap();
        assert_eq!(bytes, vec![0xff, 0x00]);
    }

    #[test]
    fn test_structs_use_serializer() {
        let s = JsonSerializer;
        let user = User {
            id: 1,
            name: "alice".to_string(),
        };
        let raw = encode(&s, &user).unwrap();
        assert_eq!(raw, br#"{"id":1,"name":"alice"}"#);
        assert_eq!(decode::<_, User>(&s, &raw).unwrap(), user);
    }

    #[test]
    fn test_invalid_utf8_string() {
        let result = decode::<_, String>(&JsonSerializer, &[0xff, 0xfe]);
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }
}
