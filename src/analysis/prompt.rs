// 提示词构建 - 患者档案、疼痛等级、上次就诊与本次症状

use crate::storage::{Profile, VisitRecord};

/// 患者档案段落，档案为空时返回 None
pub fn profile_context(profile: &Profile) -> Option<String> {
    let mut lines = Vec::new();

    if !profile.name.trim().is_empty() {
        lines.push(format!("姓名: {}", profile.name.trim()));
    }
    if !profile.age.trim().is_empty() {
        lines.push(format!("年龄: {} 岁", profile.age.trim()));
    }
    if !profile.height.trim().is_empty() {
        lines.push(format!("身高: {} cm", profile.height.trim()));
    }
    if !profile.weight.trim().is_empty() {
        lines.push(format!("体重: {} kg", profile.weight.trim()));
    }
    if let Some(bmi) = profile.bmi() {
        lines.push(format!("BMI: {:.1}", bmi));
    }
    if !profile.diagnosis.trim().is_empty() {
        lines.push(format!("诊断: {}", profile.diagnosis.trim()));
    }
    if !profile.history.trim().is_empty() {
        lines.push(format!("病史: {}", profile.history.trim()));
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// 上次就诊段落，用于让模型判断病情动态
pub fn previous_visit_context(last: Option<&VisitRecord>) -> Option<String> {
    let last = last?;
    let mut lines = vec!["上次分析（用于判断病情动态）:".to_string()];

    let date = if last.timestamp.trim().is_empty() {
        "--"
    } else {
        last.timestamp.trim()
    };
    lines.push(format!("  日期: {}", date));
    if let Some(angle) = last.angle {
        lines.push(format!("  侧弯角度: {}°", angle));
    }
    if let Some(pain) = last.pain_level {
        lines.push(format!("  疼痛等级: {}/10", pain));
    }
    lines.push("请与本次情况对比并给出病情动态。".to_string());

    Some(lines.join("\n"))
}

/// 构建完整的诊断提示词
pub fn build_prompt(
    profile: &Profile,
    pain_level: Option<u8>,
    previous: Option<&VisitRecord>,
    symptoms: &str,
    has_image: bool,
) -> String {
    let mut prompt = String::from("你是一名经验丰富的脊柱科医生和影像科医生。\n");

    if let Some(context) = profile_context(profile) {
        prompt.push_str(&format!("\n患者信息:\n{}\n", context));
    }
    if let Some(pain) = pain_level {
        prompt.push_str(&format!("\n患者疼痛等级: {}/10\n", pain));
    }
    if let Some(context) = previous_visit_context(previous) {
        prompt.push_str(&format!("\n{}\n", context));
    }

    let symptoms = symptoms.trim();
    prompt.push_str(&format!(
        "\n本次主诉/症状: {}\n",
        if symptoms.is_empty() { "未填写" } else { symptoms }
    ));

    if has_image {
        prompt.push_str("\n附件是患者的影像检查图片，请结合图片分析。\n");
    }

    prompt.push_str(
        r#"
任务：分析以上资料和影像（如有）。
严格按照下面的 JSON 格式返回，JSON 前后不要有任何其他文字。

{
  "curvature_angle": <数字；无法判断时为 null>,
  "pressure_zone": "<腰椎 / 胸椎 / 颈椎 / null>",
  "recommended_stiffness": "<软 / 中等 / 硬 / 不需要>",
  "risk_level": "<low / medium / high>",
  "urgent": <true 或 false，是否需要尽快就医>,
  "exercises": ["练习名称1", "练习名称2"],
  "comment": "<面向患者的详细说明>",
  "dynamics": "<improvement / worsening / unchanged / initial_visit>",
  "dynamics_comment": "<与上次就诊的对比，没有上次数据时留空>",
  "disclaimer": "<提醒患者需要线下面诊的说明>"
}"#,
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile_has_no_context() {
        assert!(profile_context(&Profile::default()).is_none());
    }

    #[test]
    fn test_profile_context_includes_bmi() {
        let profile = Profile {
            name: "张三".to_string(),
            height: "170".to_string(),
            weight: "70".to_string(),
            ..Default::default()
        };
        let context = profile_context(&profile).unwrap();
        assert!(context.contains("姓名: 张三"));
        assert!(context.contains("BMI: 24.2"));
        assert!(!context.contains("年龄"));
    }

    #[test]
    fn test_prompt_with_previous_visit() {
        let previous = VisitRecord {
            timestamp: "2026-03-01 09:30:00".to_string(),
            symptoms: String::new(),
            pain_level: Some(6),
            risk: Default::default(),
            angle: Some(15.0),
            stiffness_recommendation: None,
            zone: None,
            urgent: false,
            exercises: vec![],
            comment: String::new(),
            dynamics: Default::default(),
            dynamics_comment: String::new(),
        };

        let prompt = build_prompt(&Profile::default(), Some(3), Some(&previous), "腰痛", false);
        assert!(prompt.contains("患者疼痛等级: 3/10"));
        assert!(prompt.contains("日期: 2026-03-01 09:30:00"));
        assert!(prompt.contains("侧弯角度: 15°"));
        assert!(prompt.contains("疼痛等级: 6/10"));
        assert!(prompt.contains("本次主诉/症状: 腰痛"));
        assert!(prompt.contains("\"dynamics_comment\""));
        assert!(!prompt.contains("患者信息"));
    }

    #[test]
    fn test_prompt_without_symptoms_mentions_image() {
        let prompt = build_prompt(&Profile::default(), None, None, "  ", true);
        assert!(prompt.contains("未填写"));
        assert!(prompt.contains("影像检查图片"));
        assert!(!prompt.contains("上次分析"));
    }
}
