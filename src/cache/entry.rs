//! 存儲條目格式
//!
//! 每個條目的第一個位元組是標籤：`0x01` 後接值的位元組，`0x00` 表示缺失值。

use crate::error::CacheError;

const TAG_ABSENT: u8 = 0x00;
const TAG_PRESENT: u8 = 0x01;

/// 解碼後的條目
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Entry<'a> {
    Present(&'a [u8]),
    Absent,
}

/// 編碼存在的值
pub(crate) fn present(payload: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(payload.len() + 1);
    raw.push(TAG_PRESENT);
    raw.extend_from_slice(payload);
    raw
}

/// 編碼缺失值標記
pub(crate) fn absent() -> Vec<u8> {
    vec![TAG_ABSENT]
}

/// 解碼條目，空內容或未知標籤視為損壞
pub(crate) fn decode<'a>(key: &str, raw: &'a [u8]) -> Result<Entry<'a>, CacheError> {
    match raw.split_first() {
        Some((&TAG_PRESENT, payload)) => Ok(Entry::Present(payload)),
        Some((&TAG_ABSENT, [])) => Ok(Entry::Absent),
        _ => Err(CacheError::CorruptEntry(key.to_string())),
    }
}
