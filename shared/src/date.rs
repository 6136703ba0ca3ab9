//! 时间戳模块
//!
//! `Timestamp`: 可序列化的毫秒时间戳，用于本地会话缓存和传输。
//! 底层使用 `chrono`，在 wasm32 上由 `wasmbind` 特性提供当前时间。

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::time::Duration;

/// 毫秒时间戳
///
/// 内部存储为 `i64`，表示自 Unix 纪元以来的毫秒数（与 `Date.now()` 一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    #[inline]
    pub const fn new(ms: i64) -> Self {
        Self(ms)
    }

    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// 转换为 `DateTime<Utc>`，超出范围时退回 Unix 纪元
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or_default()
    }

    /// RFC 3339 字符串（用于展示和上报）
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339()
    }

    /// 距离 `earlier` 经过的时间，`earlier` 在未来时为零
    pub fn since(&self, earlier: Timestamp) -> Duration {
        *self - earlier
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Self(ms)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_millis() as i64)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    /// 两个时间戳之间的差值（负值截断为零）
    fn sub(self, rhs: Timestamp) -> Self::Output {
        let diff_ms = (self.0 - rhs.0).max(0);
        Duration::from_millis(diff_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_saturates_at_zero() {
        let a = Timestamp::new(1_000);
        let b = Timestamp::new(5_000);
        assert_eq!(b - a, Duration::from_secs(4));
        assert_eq!(a - b, Duration::ZERO);
    }

    #[test]
    fn test_datetime_conversion() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.to_datetime(), dt);
        assert!(ts.to_rfc3339().starts_with("2024-03-01T12:00:00"));
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&Timestamp::new(1_700_000_000_000)).unwrap();
        assert_eq!(json, "1700000000000");
    }
}
