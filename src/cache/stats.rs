/// 快取實例統計信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// 是否配置了內存層
    pub memory_enabled: bool,
    /// 是否配置了遠端層
    pub remote_enabled: bool,
    /// 進行中的單鍵載入數
    pub in_flight_loads: usize,
    /// 進行中的批量載入數
    pub in_flight_batch_loads: usize,
}
