//! 实体规范化 - 线上/存储表示 → 内存实体
//!
//! 规范化是全函数：任何输入（包括 `null`、非对象、字段缺失或类型错误）都产出一个
//! 最小合法的实体，永远不会报错。字段默认值策略：
//!
//! | 字段类别 | 缺失时 |
//! |---|---|
//! | 标识符 / 自由文本 | 空字符串 |
//! | 枚举 / 状态 | 该类型的初始状态 |
//! | 时间戳 | 规范化时刻的 ISO-8601 |
//! | 数值 | 0 |
//! | 集合 | 空序列 |
//!
//! 线上表示即实体的 `Serialize` 输出（snake_case 字段名），因此
//! `normalize(&to_raw(&normalize(x))) == normalize(x)`。

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::utils::TimeFormatter;

/// 规范化 trait：每个实体类型一个实现
pub trait Normalize: Sized {
    /// 从任意原始记录构造实体，不会失败
    fn normalize(raw: &Value) -> Self;

    /// 批量规范化
    fn normalize_all(raws: &[Value]) -> Vec<Self> {
        raws.iter().map(Self::normalize).collect()
    }

    /// 转回线上表示
    fn to_raw(&self) -> Value
    where
        Self: Serialize,
    {
        // 实体只包含字符串/数字/布尔/数组/对象字段，序列化不会失败
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 原始记录读取器，所有读取都带默认值
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Fields<'a> {
    pub fn of(raw: &'a Value) -> Self {
        Self { map: raw.as_object() }
    }

    /// `null` 与缺失等价
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(key)).filter(|v| !v.is_null())
    }

    /// 自由文本 / 标识符，缺失时为空字符串
    pub fn text(&self, key: &str) -> String {
        self.text_or(key, "")
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.opt_text(key).unwrap_or_else(|| default.to_string())
    }

    /// 可选文本；数字 ID 也按字符串读取
    pub fn opt_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 时间戳，缺失时取当前时间
    pub fn timestamp(&self, key: &str) -> String {
        self.opt_text(key).unwrap_or_else(TimeFormatter::now_iso8601)
    }

    pub fn number(&self, key: &str) -> f64 {
        self.number_or(key, 0.0)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn integer(&self, key: &str) -> i64 {
        self.integer_or(key, 0)
    }

    pub fn integer_or(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(v) => v
                .as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            None => default,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// 枚举字段；未知取值同样回落到初始状态
    pub fn enumeration<E>(&self, key: &str) -> E
    where
        E: DeserializeOwned + Default,
    {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// 集合字段；单个元素解码失败只丢弃该元素
    pub fn list<T>(&self, key: &str) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// 内嵌对象字段
    pub fn object<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.get(key)
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// 让实体的 `Deserialize` 走规范化，使解码同样是全函数
macro_rules! deserialize_via_normalize {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'de> serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let raw = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
                    Ok(<$ty as $crate::storage::normalize::Normalize>::normalize(&raw))
                }
            }
        )*
    };
}

pub(crate) use deserialize_via_normalize;
