// 数据模型定义 - 就诊记录与宽松的 JSON 字段解析

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 记录时间戳的存储格式（本地时间）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 读取时兼容的旧格式
const LEGACY_TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M", "%d.%m.%Y %H:%M:%S"];

/// 获取当前本地时间（不带时区）
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// 按存储格式格式化时间
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// 解析记录中的时间戳，无法识别时返回 None
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(time) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return Some(time);
    }

    for format in LEGACY_TIMESTAMP_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(time);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|time| time.with_timezone(&Local).naive_local())
}

/// 风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl RiskLevel {
    /// 从模型返回的文本识别风险等级（大小写不敏感，兼容中文）
    pub fn from_text(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "low" | "低" | "低风险" | "низкий" => Self::Low,
            "medium" | "moderate" | "中" | "中等" | "中风险" | "средний" => Self::Medium,
            "high" | "高" | "高风险" | "высокий" => Self::High,
            _ => Self::Unknown,
        }
    }

    /// 显示名称
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "低",
            Self::Medium => "中",
            Self::High => "高",
            Self::Unknown => "未知",
        }
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(text)) => Self::from_text(&text),
            _ => Self::Unknown,
        })
    }
}

/// 与上次就诊相比的病情动态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Dynamics {
    Improvement,
    Worsening,
    Unchanged,
    #[default]
    InitialVisit,
}

impl Dynamics {
    pub fn from_text(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "improvement" | "improved" | "好转" | "改善" | "uluchshenie" => Self::Improvement,
            "worsening" | "worsened" | "恶化" | "加重" | "uhudshenie" => Self::Worsening,
            "unchanged" | "no_change" | "stable" | "无变化" | "稳定" | "bez_izmeneniy" => {
                Self::Unchanged
            }
            _ => Self::InitialVisit,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Improvement => "好转",
            Self::Worsening => "恶化",
            Self::Unchanged => "无变化",
            Self::InitialVisit => "首次就诊",
        }
    }
}

impl<'de> Deserialize<'de> for Dynamics {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(text)) => Self::from_text(&text),
            _ => Self::InitialVisit,
        })
    }
}

/// 一次就诊记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// 创建时间（本地时间文本），旧版本文件使用 "date" 字段
    #[serde(default, alias = "date", deserialize_with = "deserialize_text")]
    pub timestamp: String,
    /// 症状描述
    #[serde(default, deserialize_with = "deserialize_text")]
    pub symptoms: String,
    /// 疼痛等级 0-10
    #[serde(default, deserialize_with = "deserialize_pain_level")]
    pub pain_level: Option<u8>,
    #[serde(default)]
    pub risk: RiskLevel,
    /// 脊柱侧弯角度（度）
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub angle: Option<f64>,
    /// 推荐的护具硬度，旧版本文件使用 "stiffness" 字段
    #[serde(default, alias = "stiffness", deserialize_with = "deserialize_optional_text")]
    pub stiffness_recommendation: Option<String>,
    /// 问题区域
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub zone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub urgent: bool,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub exercises: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub comment: String,
    #[serde(default)]
    pub dynamics: Dynamics,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub dynamics_comment: String,
}

impl VisitRecord {
    /// 解析后的时间戳
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

// ==================== 宽松字段解析 ====================
//
// 历史文件和模型返回的 JSON 都可能字段类型不一致，
// 数值字段无法识别时视为未设置，而不是报错。

fn number_from_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text
            .trim()
            .trim_end_matches('°')
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

pub(crate) fn deserialize_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

pub(crate) fn deserialize_pain_level<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let level = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(level.filter(|l| *l <= 10).map(|l| l as u8))
}

pub(crate) fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "1" | "是" | "需要"
        ),
        _ => false,
    })
}

pub(crate) fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    match value {
        Some(Value::String(s)) => {
            // 单个字符串视为只有一个元素的列表
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![trimmed.to_string()])
            }
        }
        Some(Value::Array(arr)) => Ok(arr
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2026-03-01 09:30:00").is_some());
        assert!(parse_timestamp("01.03.2026 09:30").is_some());
        assert!(parse_timestamp("2026-03-01T09:30:00+03:00").is_some());
        assert!(parse_timestamp("昨天").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_visit_record_lenient_fields() {
        // 旧版本把未填写的疼痛等级保存为 "--"
        let json = r#"{
            "timestamp": "01.03.2026 09:30",
            "symptoms": "腰痛",
            "pain_level": "--",
            "risk": "HIGH",
            "angle": "12.5°",
            "zone": "null",
            "urgent": "true",
            "exercises": "猫牛式",
            "dynamics": "something-else"
        }"#;

        let record: VisitRecord = serde_json::from_str(json).expect("解析失败");
        assert_eq!(record.pain_level, None);
        assert_eq!(record.risk, RiskLevel::High);
        assert_eq!(record.angle, Some(12.5));
        assert_eq!(record.zone, None);
        assert!(record.urgent);
        assert_eq!(record.exercises, vec!["猫牛式".to_string()]);
        assert_eq!(record.dynamics, Dynamics::InitialVisit);
        assert_eq!(record.comment, "");
    }

    #[test]
    fn test_legacy_history_record() {
        let json = r#"{
            "date": "01.03.2026 09:30",
            "symptoms": "поясница",
            "pain_level": 6,
            "risk": "средний",
            "angle": 14,
            "stiffness": "средний",
            "zone": "L4-L5",
            "urgent": false,
            "exercises": ["кошка-корова"],
            "comment": "",
            "dynamics": "uhudshenie",
            "dynamics_comment": ""
        }"#;

        let record: VisitRecord = serde_json::from_str(json).expect("解析旧版本记录失败");
        assert_eq!(record.timestamp, "01.03.2026 09:30");
        assert!(record.parsed_timestamp().is_some(), "旧版本时间戳应能解析");
        assert_eq!(record.stiffness_recommendation.as_deref(), Some("средний"));
        assert_eq!(record.risk, RiskLevel::Medium);
        assert_eq!(record.angle, Some(14.0));
        assert_eq!(record.dynamics, Dynamics::Worsening);

        // 重新保存时使用新字段名
        let saved = serde_json::to_value(&record).unwrap();
        assert_eq!(saved["timestamp"], "01.03.2026 09:30");
        assert_eq!(saved["stiffness_recommendation"], "средний");
    }

    #[test]
    fn test_legacy_labels() {
        assert_eq!(Dynamics::from_text("uluchshenie"), Dynamics::Improvement);
        assert_eq!(Dynamics::from_text("bez_izmeneniy"), Dynamics::Unchanged);
        assert_eq!(Dynamics::from_text("pervichnyy_osmotr"), Dynamics::InitialVisit);
        assert_eq!(RiskLevel::from_text("Высокий"), RiskLevel::High);
        assert_eq!(RiskLevel::from_text("неизвестно"), RiskLevel::Unknown);
    }

    #[test]
    fn test_pain_level_out_of_range_is_unset() {
        let record: VisitRecord =
            serde_json::from_str(r#"{"timestamp": "x", "pain_level": 11}"#).unwrap();
        assert_eq!(record.pain_level, None);

        let record: VisitRecord =
            serde_json::from_str(r#"{"timestamp": "x", "pain_level": 7}"#).unwrap();
        assert_eq!(record.pain_level, Some(7));
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"medium\"");
        assert_eq!(
            serde_json::to_string(&Dynamics::InitialVisit).unwrap(),
            "\"initial_visit\""
        );
        assert_eq!(Dynamics::from_text("Improvement"), Dynamics::Improvement);
        assert_eq!(RiskLevel::from_text("中等"), RiskLevel::Medium);
    }
}
