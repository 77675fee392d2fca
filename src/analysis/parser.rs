// AI返回解析 - 先宽松预处理，再严格反序列化

use std::sync::OnceLock;

use llm_json::{loads, repair_json, RepairOptions};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::AnalysisError;
use crate::storage::models::{
    deserialize_lenient_bool, deserialize_optional_number, deserialize_optional_text,
    deserialize_string_list, deserialize_text,
};
use crate::storage::{Dynamics, RiskLevel, VisitRecord};

/// 模型应返回的字段
pub const EXPECTED_KEYS: [&str; 10] = [
    "curvature_angle",
    "pressure_zone",
    "recommended_stiffness",
    "risk_level",
    "urgent",
    "exercises",
    "comment",
    "dynamics",
    "dynamics_comment",
    "disclaimer",
];

/// 一次诊断的结构化结果
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DiagnosisReport {
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub curvature_angle: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub pressure_zone: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub recommended_stiffness: Option<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
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
    #[serde(default, deserialize_with = "deserialize_text")]
    pub disclaimer: String,
}

impl DiagnosisReport {
    /// 结合本次输入生成就诊记录
    pub fn to_visit_record(
        &self,
        symptoms: &str,
        pain_level: Option<u8>,
        timestamp: String,
    ) -> VisitRecord {
        VisitRecord {
            timestamp,
            symptoms: symptoms.trim().to_string(),
            pain_level,
            risk: self.risk_level,
            angle: self.curvature_angle,
            stiffness_recommendation: self.recommended_stiffness.clone(),
            zone: self.pressure_zone.clone(),
            urgent: self.urgent,
            exercises: self.exercises.clone(),
            comment: self.comment.clone(),
            dynamics: self.dynamics,
            dynamics_comment: self.dynamics_comment.clone(),
        }
    }
}

fn code_fence_pattern() -> &'static Regex {
    static CODE_FENCE: OnceLock<Regex> = OnceLock::new();
    CODE_FENCE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").unwrap())
}

fn object_span(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&body[start..=end])
}

/// 宽松预处理：去掉 Markdown 代码块，截取最外层的 {...}
///
/// 依次尝试每个代码块，都不含对象时退回整段文本
pub fn extract_json_object(raw: &str) -> Option<&str> {
    code_fence_pattern()
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| object_span(m.as_str()))
        .or_else(|| object_span(raw))
}

/// 解析模型返回的文本
///
/// `repair` 为 true 时，严格解析失败后尝试用 llm_json 修复
pub fn parse_diagnosis(raw: &str, repair: bool) -> Result<DiagnosisReport, AnalysisError> {
    if raw.trim().is_empty() {
        return Err(AnalysisError::malformed("AI 返回了空内容", raw));
    }

    let candidate = extract_json_object(raw)
        .ok_or_else(|| AnalysisError::malformed("返回内容中没有 JSON 对象", raw))?;

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(e) if repair => {
            warn!("AI 返回的 JSON 格式错误，尝试修复: {}", e);
            let repaired = repair_json(candidate, &RepairOptions::default())
                .map_err(|err| AnalysisError::malformed(format!("JSON 修复失败: {}", err), raw))?;
            loads(&repaired, &RepairOptions::default()).map_err(|err| {
                AnalysisError::malformed(format!("解析修复后的 JSON 失败: {}", err), raw)
            })?
        }
        Err(e) => {
            return Err(AnalysisError::malformed(format!("JSON 格式错误: {}", e), raw));
        }
    };

    let Some(object) = value.as_object() else {
        return Err(AnalysisError::malformed("返回的 JSON 不是对象", raw));
    };
    if !EXPECTED_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(AnalysisError::malformed("返回的 JSON 缺少诊断字段", raw));
    }

    let report: DiagnosisReport = serde_json::from_value(value)
        .map_err(|e| AnalysisError::malformed(format!("JSON 结构不符合预期: {}", e), raw))?;
    debug!(
        "诊断解析完成: risk={:?}, angle={:?}",
        report.risk_level, report.curvature_angle
    );
    Ok(report)
}
