//! TTL 與缺失值快取策略
//!
//! 純函數，不做任何 I/O。每次呼叫的覆蓋值優先於實例預設值。

use std::time::Duration;

use crate::error::CacheError;

pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REMOTE_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);
pub const DEFAULT_ABSENCE_TTL: Duration = Duration::from_secs(60);

/// 快取實例的預設策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub memory_ttl: Duration,
    pub remote_ttl: Duration,
    pub cache_absence: bool,
    pub absence_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            memory_ttl: DEFAULT_MEMORY_TTL,
            remote_ttl: DEFAULT_REMOTE_TTL,
            cache_absence: false,
            absence_ttl: DEFAULT_ABSENCE_TTL,
        }
    }
}

impl CachePolicy {
    /// 驗證預設值，只檢查已啟用的層
    pub fn validate(&self, memory_enabled: bool, remote_enabled: bool) -> Result<(), CacheError> {
        if memory_enabled && self.memory_ttl.is_zero() {
            return Err(CacheError::InvalidMemoryTtl);
        }
        if remote_enabled && self.remote_ttl.is_zero() {
            return Err(CacheError::InvalidRemoteTtl);
        }
        if self.cache_absence && self.absence_ttl.is_zero() {
            return Err(CacheError::InvalidAbsenceTtl);
        }
        Ok(())
    }
}

/// 單次呼叫的覆蓋值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlOverrides {
    pub memory_ttl: Option<Duration>,
    pub remote_ttl: Option<Duration>,
    pub cache_absence: Option<bool>,
    pub absence_ttl: Option<Duration>,
}

impl TtlOverrides {
    /// 驗證覆蓋值，與實例配置了哪些層無關
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.memory_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidMemoryTtl);
        }
        if self.remote_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidRemoteTtl);
        }
        if self.absence_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidAbsenceTtl);
        }
        Ok(())
    }
}

/// 寫入時的 (內存 TTL, 遠端 TTL)
pub fn resolve_set_ttl(overrides: &TtlOverrides, defaults: &CachePolicy) -> (Duration, Duration) {
    (
        overrides.memory_ttl.unwrap_or(defaults.memory_ttl),
        overrides.remote_ttl.unwrap_or(defaults.remote_ttl),
    )
}

/// 載入後寫入的 (內存 TTL, 遠端 TTL)，缺失值兩層都使用缺失值 TTL
pub fn resolve_load_ttl(
    overrides: &TtlOverrides,
    defaults: &CachePolicy,
    is_absence: bool,
) -> (Duration, Duration) {
    if is_absence {
        let ttl = resolve_absence_ttl(overrides, defaults);
        return (ttl, ttl);
    }
    resolve_set_ttl(overrides, defaults)
}

pub fn resolve_absence_ttl(overrides: &TtlOverrides, defaults: &CachePolicy) -> Duration {
    overrides.absence_ttl.unwrap_or(defaults.absence_ttl)
}

/// 是否快取缺失值
pub fn should_cache_absence(override_flag: Option<bool>, default_flag: bool) -> bool {
    override_flag.unwrap_or(default_flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_defaults() {
        let policy = CachePolicy::default();
        assert_eq!(policy.memory_ttl, secs(300));
        assert_eq!(policy.remote_ttl, secs(1_209_600));
        assert!(!policy.cache_absence);
        assert_eq!(policy.absence_ttl, secs(60));
    }

    #[test]
    fn test_resolve_set_ttl() {
        let defaults = CachePolicy::default();
        assert_eq!(
            resolve_set_ttl(&TtlOverrides::default(), &defaults),
            (secs(300), secs(1_209_600))
        );

        let overrides = TtlOverrides {
            memory_ttl: Some(secs(10)),
            ..Default::default()
        };
        assert_eq!(
            resolve_set_ttl(&overrides, &defaults),
            (secs(10), secs(1_209_600))
        );
    }

    #[test]
    fn test_resolve_load_ttl_collapses_for_absence() {
        let defaults = CachePolicy::default();
        let overrides = TtlOverrides {
            memory_ttl: Some(secs(10)),
            remote_ttl: Some(secs(20)),
            absence_ttl: Some(secs(5)),
            ..Default::default()
        };
        assert_eq!(
            resolve_load_ttl(&overrides, &defaults, false),
            (secs(10), secs(20))
        );
        assert_eq!(resolve_load_ttl(&overrides, &defaults, true), (secs(5), secs(5)));
        assert_eq!(
            resolve_load_ttl(&TtlOverrides::default(), &defaults, true),
            (secs(60), secs(60))
        );
    }

    #[test]
    fn test_should_cache_absence() {
        assert!(should_cache_absence(Some(true), false));
        assert!(!should_cache_absence(Some(false), true));
        assert!(should_cache_absence(None, true));
    }

    #[test]
    fn test_override_validation_ignores_tiers() {
        let overrides = TtlOverrides {
            remote_ttl: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_matches!(overrides.validate(), Err(CacheError::InvalidRemoteTtl));

        let overrides = TtlOverrides {
            absence_ttl: Some(Duration::ZERO),
            cache_absence: Some(false),
            ..Default::default()
        };
        assert_matches!(overrides.validate(), Err(CacheError::InvalidAbsenceTtl));
    }

    #[test]
    fn test_policy_validation_checks_enabled_tiers_only() {
        let policy = CachePolicy {
            remote_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert!(policy.validate(true, false).is_ok());
        assert_matches!(policy.validate(true, true), Err(CacheError::InvalidRemoteTtl));
    }
}
