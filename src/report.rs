// 结果展示 - 分析结果、历史列表、动态统计与 Markdown 报告

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::session::CompletedAnalysis;
use crate::storage::{
    format_timestamp, local_now, ChartPoint, Delta, Dynamics, DynamicsSummary, Favorability,
    Profile, VisitRecord, PROFILE_FIELDS,
};

const SEPARATOR: &str = "----------------------------------------";

fn format_angle(angle: Option<f64>) -> String {
    angle.map(|a| format!("{}°", a)).unwrap_or_else(|| "--".to_string())
}

fn format_pain(pain: Option<u8>) -> String {
    pain.map(|p| format!("{}/10", p))
        .unwrap_or_else(|| "--/10".to_string())
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("--")
}

fn dynamics_headline(dynamics: Dynamics) -> &'static str {
    match dynamics {
        Dynamics::Improvement => "好转（积极）",
        Dynamics::Worsening => "恶化（消极）",
        Dynamics::Unchanged => "无变化",
        Dynamics::InitialVisit => "首次就诊",
    }
}

fn format_delta(delta: &Delta, trend: Option<Favorability>, unit: &str) -> String {
    match delta {
        Delta::Unavailable => "--".to_string(),
        Delta::Changed {
            direction,
            magnitude,
        } => {
            let verdict = match trend {
                Some(Favorability::Favorable) => "有利",
                Some(Favorability::Unfavorable) => "不利",
                None => "",
            };
            format!("{} {}{}（{}）", direction.symbol(), magnitude, unit, verdict)
        }
    }
}

/// 分析结果文本
pub fn render_result(completed: &CompletedAnalysis) -> String {
    let report = &completed.report;
    let record = &completed.record;
    let mut out = String::new();

    if report.dynamics != Dynamics::InitialVisit {
        let _ = writeln!(out, "📊 病情动态: {}", dynamics_headline(report.dynamics));
        if !report.dynamics_comment.trim().is_empty() {
            let _ = writeln!(out, "   {}", report.dynamics_comment.trim());
        }
        let _ = writeln!(out, "{}", SEPARATOR);
    }

    let angle = report
        .curvature_angle
        .map(|a| format!("{}°", a))
        .unwrap_or_else(|| "无法确定".to_string());
    let _ = writeln!(out, "📐 侧弯角度:   {}", angle);
    let _ = writeln!(out, "📍 问题区域:   {}", or_dash(report.pressure_zone.as_deref()));
    let _ = writeln!(
        out,
        "⚙️ 护具硬度:   {}",
        or_dash(report.recommended_stiffness.as_deref())
    );
    let _ = writeln!(out, "⚠️ 风险等级:   {}", report.risk_level.label());
    let _ = writeln!(
        out,
        "🚑 尽快就医:   {}",
        if report.urgent {
            "是，请尽快就医！"
        } else {
            "否，按计划复查"
        }
    );
    if let Some(pain) = record.pain_level {
        let _ = writeln!(out, "⚡ 疼痛等级:   {}/10", pain);
    }

    let _ = writeln!(out, "\n🏃 推荐练习:");
    if report.exercises.is_empty() {
        let _ = writeln!(out, "   （无）");
    }
    for exercise in &report.exercises {
        let _ = writeln!(out, "   • {}", exercise);
    }

    let _ = writeln!(out, "\n💬 AI 结论:\n{}", report.comment.trim());
    if !report.disclaimer.trim().is_empty() {
        let _ = writeln!(out, "\nℹ️ 重要: {}", report.disclaimer.trim());
    }

    out
}

/// 历史列表（最新的在前）
pub fn render_history(records: &[VisitRecord]) -> String {
    if records.is_empty() {
        return "历史为空，先做一次分析吧。".to_string();
    }

    let mut out = String::new();
    for record in records.iter().rev() {
        let mut metrics = Vec::new();
        if let Some(pain) = record.pain_level {
            metrics.push(format!("疼痛: {}/10", pain));
        }
        if let Some(angle) = record.angle {
            metrics.push(format!("角度: {}°", angle));
        }

        let timestamp = if record.timestamp.trim().is_empty() {
            "--"
        } else {
            record.timestamp.as_str()
        };
        let _ = write!(out, "[{}] 风险: {}", timestamp, record.risk.label());
        if !metrics.is_empty() {
            let _ = write!(out, " | {}", metrics.join(" | "));
        }
        if record.urgent {
            let _ = write!(out, " | 需尽快就医");
        }
        out.push('\n');

        if record.dynamics != Dynamics::InitialVisit {
            let _ = writeln!(out, "  动态: {}", record.dynamics.label());
        }
        if !record.comment.trim().is_empty() {
            let _ = writeln!(out, "  {}", record.comment.trim());
        }
    }

    out
}

/// 动态统计与图表数据
pub fn render_dynamics(
    summary: &DynamicsSummary,
    series: impl IntoIterator<Item = ChartPoint>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "就诊次数: {}", summary.total_visits);
    let _ = writeln!(
        out,
        "当前角度: {}  变化: {}",
        format_angle(summary.current_angle),
        format_delta(&summary.angle_delta, summary.angle_trend, "°")
    );
    let _ = writeln!(
        out,
        "当前疼痛: {}  变化: {}",
        format_pain(summary.current_pain),
        format_delta(&summary.pain_delta, summary.pain_trend, "")
    );

    let points: Vec<ChartPoint> = series.into_iter().collect();
    if points.is_empty() {
        let _ = writeln!(out, "\n暂无可绘制的数据");
        return out;
    }

    let _ = writeln!(out, "\n{:<18} {:>8} {:>6}", "日期", "角度", "疼痛");
    for point in &points {
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>6}",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            format_angle(point.angle),
            point
                .pain_level
                .map(|p| p.to_string())
                .unwrap_or_else(|| "--".to_string())
        );
    }

    out
}

fn profile_label(key: &str) -> &'static str {
    match key {
        "name" => "姓名",
        "age" => "年龄",
        "height" => "身高(cm)",
        "weight" => "体重(kg)",
        "diagnosis" => "诊断",
        "history" => "病史",
        _ => "",
    }
}

/// 档案文本
pub fn render_profile(profile: &Profile) -> String {
    let mut out = String::new();
    for key in PROFILE_FIELDS {
        let _ = writeln!(
            out,
            "{:<10} {:<10} {}",
            key,
            profile_label(key),
            or_dash(profile.field(key))
        );
    }
    let bmi = profile
        .bmi()
        .map(|b| format!("{:.1}", b))
        .unwrap_or_else(|| "--".to_string());
    let _ = writeln!(out, "{:<10} {:<10} {}", "bmi", "BMI", bmi);
    out
}

/// 档案与最近一次分析的 Markdown 报告
pub fn render_markdown_report(profile: &Profile, completed: &CompletedAnalysis) -> String {
    let report = &completed.report;
    let record = &completed.record;
    let mut out = String::new();

    let _ = writeln!(out, "# 脊柱健康分析报告\n");
    let _ = writeln!(out, "生成时间: {}\n", format_timestamp(&local_now()));

    let _ = writeln!(out, "## 患者信息\n");
    for key in PROFILE_FIELDS {
        let _ = writeln!(out, "- {}: {}", profile_label(key), or_dash(profile.field(key)));
    }
    if let Some(bmi) = profile.bmi() {
        let _ = writeln!(out, "- BMI: {:.1}", bmi);
    }

    let _ = writeln!(out, "\n## 本次分析（{}）\n", record.timestamp);
    if !record.symptoms.is_empty() {
        let _ = writeln!(out, "- 症状: {}", record.symptoms);
    }
    let _ = writeln!(out, "- 疼痛等级: {}", format_pain(record.pain_level));
    let _ = writeln!(out, "- 侧弯角度: {}", format_angle(report.curvature_angle));
    let _ = writeln!(out, "- 问题区域: {}", or_dash(report.pressure_zone.as_deref()));
    let _ = writeln!(
        out,
        "- 护具硬度: {}",
        or_dash(report.recommended_stiffness.as_deref())
    );
    let _ = writeln!(out, "- 风险等级: {}", report.risk_level.label());
    let _ = writeln!(
        out,
        "- 尽快就医: {}",
        if report.urgent { "**是**" } else { "否" }
    );
    if report.dynamics != Dynamics::InitialVisit {
        let _ = writeln!(out, "- 病情动态: {}", dynamics_headline(report.dynamics));
        if !report.dynamics_comment.trim().is_empty() {
            let _ = writeln!(out, "  - {}", report.dynamics_comment.trim());
        }
    }

    let _ = writeln!(out, "\n## 推荐练习\n");
    if report.exercises.is_empty() {
        let _ = writeln!(out, "（无）");
    }
    for (i, exercise) in report.exercises.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, exercise);
    }

    let _ = writeln!(out, "\n## 结论\n\n{}", report.comment.trim());
    if !report.disclaimer.trim().is_empty() {
        let _ = writeln!(out, "\n> {}", report.disclaimer.trim());
    }

    out
}

/// 写出报告文件
pub fn export_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {:?}", parent))?;
    }
    std::fs::write(path, content).with_context(|| format!("写入报告失败: {:?}", path))?;
    info!("报告已导出: {:?}", path);
    Ok(())
}
