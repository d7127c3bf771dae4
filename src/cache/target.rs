//! MGet 的目標容器

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::error::CacheError;

/// 以字串為鍵的結果容器
///
/// 靜態類型的映射永遠有效；動態的 `serde_json::Value` 只有在是 JSON 物件時才有效。
pub trait MGetTarget {
    type Value: Serialize + DeserializeOwned + Send + 'static;

    /// 在任何 I/O 之前檢查容器結構
    fn validate(&self) -> Result<(), CacheError> {
        Ok(())
    }

    /// 清空原有內容
    fn reset(&mut self);

    fn insert(&mut self, key: String, value: Self::Value);
}

impl<T, H> MGetTarget for HashMap<String, T, H>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    H: BuildHasher,
{
    type Value = T;

    fn reset(&mut self) {
        self.clear();
    }

    fn insert(&mut self, key: String, value: T) {
        HashMap::insert(self, key, value);
    }
}

impl<T> MGetTarget for BTreeMap<String, T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Value = T;

    fn reset(&mut self) {
        self.clear();
    }

    fn insert(&mut self, key: String, value: T) {
        BTreeMap::insert(self, key, value);
    }
}

impl MGetTarget for serde_json::Value {
    type Value = serde_json::Value;

    fn validate(&self) -> Result<(), CacheError> {
        match self {
            serde_json::Value::Object(_) => Ok(()),
            _ => Err(CacheError::InvalidMGetTarget),
        }
    }

    fn reset(&mut self) {
        if let serde_json::Value::Object(map) = self {
            map.clear();
        }
    }

    fn insert(&mut self, key: String, value: serde_json::Value) {
        if let serde_json::Value::Object(map) = self {
            map.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_json_target_must_be_object() {
        assert!(json!({}).validate().is_ok());
        assert_matches!(serde_json::Value::Null.validate(), Err(CacheError::InvalidMGetTarget));
        assert_matches!(json!([1, 2]).validate(), Err(CacheError::InvalidMGetTarget));
        assert_matches!(json!("text").validate(), Err(CacheError::InvalidMGetTarget));
    }

    #[test]
    fn test_reset_replaces_contents() {
        let mut target = json!({"stale": 1});
        target.reset();
        MGetTarget::insert(&mut target, "fresh".to_string(), json!(2));
        assert_eq!(target, json!({"fresh": 2}));

        let mut map: HashMap<String, u32> = HashMap::from([("stale".to_string(), 1)]);
        map.reset();
        MGetTarget::insert(&mut map, "fresh".to_string(), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map["fresh"], 2);
    }
}
