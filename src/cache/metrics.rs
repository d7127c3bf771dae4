use metrics::{counter, histogram};
use std::time::Duration;

/// 監控指標命名空間
pub const METRIC_NAMESPACE: &str = "layered_cache";

/// 快取層
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Memory,
    Remote,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Memory => "memory",
            Layer::Remote => "remote",
        }
    }
}

/// 監控指標類型
#[derive(Debug, Clone, Copy)]
pub enum MetricType {
    Hit { layer: Layer },
    AbsenceHit { layer: Layer },
    Miss,
    Load { batch: bool },
    AbsenceWrite { count: usize },
    Error { operation: &'static str },
    Batch { operation: &'static str, count: usize },
    Latency { operation: &'static str },
}

/// 快取監控指標記錄器
pub struct CacheMetrics;

impl CacheMetrics {
    /// 記錄快取指標
    ///
    /// # Arguments
    /// * `metric_type` - 指標類型
    /// * `duration` - 可選的持續時間，用於延遲指標
    pub fn record(metric_type: MetricType, duration: Option<Duration>) {
        match metric_type {
            MetricType::Hit { layer } => {
                counter!(format!("{}.hit", METRIC_NAMESPACE), "layer" => layer.as_str())
                    .increment(1);
            }
            MetricType::AbsenceHit { layer } => {
                counter!(
                    format!("{}.absence_hit", METRIC_NAMESPACE),
                    "layer" => layer.as_str()
                )
                .increment(1);
            }
            MetricType::Miss => {
                counter!(format!("{}.miss", METRIC_NAMESPACE)).increment(1);
            }
            MetricType::Load { batch } => {
                counter!(
                    format!("{}.load", METRIC_NAMESPACE),
                    "kind" => if batch { "batch" } else { "single" }
                )
                .increment(1);
                if let Some(dur) = duration {
                    histogram!(format!("{}.load_latency_ns", METRIC_NAMESPACE))
                        .record(dur.as_nanos() as f64);
                }
            }
            MetricType::AbsenceWrite { count } => {
                counter!(format!("{}.absence_write", METRIC_NAMESPACE)).increment(count as u64);
            }
            MetricType::Error { operation } => {
                counter!(
                    format!("{}.error", METRIC_NAMESPACE),
                    "operation" => operation
                )
                .increment(1);
            }
            MetricType::Batch { operation, count } => {
                histogram!(
                    format!("{}.batch_size", METRIC_NAMESPACE),
                    "operation" => operation
                )
                .record(count as f64);
            }
            MetricType::Latency { operation } => {
                if let Some(dur) = duration {
                    histogram!(
                        format!("{}.latency_ns", METRIC_NAMESPACE),
                        "operation" => operation
                    )
                    .record(dur.as_nanos() as f64);
                }
            }
        }
    }

    /// 記錄層間不一致（L1 寫入成功後 L2 失敗）
    pub fn record_inconsistency(operation: &'static str) {
        counter!(
            format!("{}.tier_inconsistency", METRIC_NAMESPACE),
            "operation" => operation
        )
        .increment(1);
    }
}
