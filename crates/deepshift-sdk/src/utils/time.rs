//! 时间处理工具模块
//!
//! # 设计原则
//!
//! - **线上/存储格式**: 实体里的时间字段一律是 ISO-8601 字符串（UTC，毫秒精度，`Z` 结尾）
//! - **队列**: `PendingAction.timestamp` 使用 UTC 毫秒时间戳
//! - **排序/比较**: 先解析成毫秒时间戳再比较，解析失败的值排在最前

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// 时间格式化工具
pub struct TimeFormatter;

impl TimeFormatter {
    /// 获取当前 UTC 毫秒时间戳
    pub fn now_utc_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// 当前时间的 ISO-8601 表示，例如 `2024-01-17T06:00:00.000Z`
    pub fn now_iso8601() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// 将 UTC 毫秒时间戳格式化为 ISO-8601
    pub fn format_iso8601(utc_timestamp_ms: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(utc_timestamp_ms)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// 解析时间字符串为 UTC 毫秒时间戳
    ///
    /// 支持 RFC 3339（`2024-01-17T06:00:00Z`、带偏移量）和纯日期（`2024-01-17`，按 UTC 零点）。
    pub fn parse_to_utc_millis(value: &str) -> Option<i64> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.timestamp_millis());
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
        date.and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc().timestamp_millis())
    }

    /// 解析出日历日期（UTC）；用于连续打卡天数等按天计算的场景
    pub fn parse_date(value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Some(date);
        }
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    }
}
