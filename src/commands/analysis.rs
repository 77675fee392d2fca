//! 诊断分析命令
//!
//! 编辑分析草稿（症状、疼痛等级、影像），提交分析并处理结果

use tracing::info;

use crate::analysis::{AnalysisDispatcher, AnalysisOutcome};
use crate::report::render_result;
use crate::session::Session;
use crate::utils::{parse_pain_level, validate_image_path};

fn is_clear_keyword(input: &str) -> bool {
    matches!(input.trim(), "" | "-" | "none" | "无")
}

/// 设置症状描述
pub fn set_symptoms(session: &mut Session, text: &str) -> String {
    session.draft_mut().symptoms = text.trim().to_string();
    if session.draft().symptoms.is_empty() {
        "症状描述已清空".to_string()
    } else {
        "症状描述已更新".to_string()
    }
}

/// 设置疼痛等级，输入 none 或 - 时清除
pub fn set_pain(session: &mut Session, input: &str) -> Result<String, String> {
    if is_clear_keyword(input) {
        session.draft_mut().pain_level = None;
        return Ok("疼痛等级已清除".to_string());
    }

    let level = parse_pain_level(input)?;
    session.draft_mut().pain_level = Some(level);
    Ok(format!("疼痛等级: {}/10", level))
}

/// 选择影像文件，输入 none 或 - 时清除
pub fn set_image(session: &mut Session, input: &str) -> Result<String, String> {
    if is_clear_keyword(input) {
        session.draft_mut().image_path = None;
        return Ok("已移除影像".to_string());
    }

    let path = validate_image_path(input)?;
    let message = format!("已选择影像: {}", path.display());
    session.draft_mut().image_path = Some(path);
    Ok(message)
}

/// 显示当前草稿
pub fn show_draft(session: &Session) -> String {
    let draft = session.draft();
    format!(
        "症状: {}\n疼痛: {}\n影像: {}",
        if draft.symptoms.is_empty() {
            "（未填写）"
        } else {
            draft.symptoms.as_str()
        },
        draft
            .pain_level
            .map(|p| format!("{}/10", p))
            .unwrap_or_else(|| "（未设置）".to_string()),
        draft
            .image_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "（无）".to_string())
    )
}

/// 提交分析，结果稍后通过队列交回
pub fn start_analysis(
    session: &Session,
    dispatcher: &AnalysisDispatcher,
) -> Result<String, String> {
    let request = session.prepare_request();
    dispatcher.dispatch(request).map_err(|e| e.to_string())?;
    info!("分析任务已提交");
    Ok("⏳ AI 正在分析，请稍候...".to_string())
}

/// 处理后台任务交回的结果
pub fn finish_analysis(session: &mut Session, outcome: AnalysisOutcome) -> Result<String, String> {
    session
        .apply_outcome(outcome)
        .map(render_result)
        .map_err(|e| e.to_string())
}

/// 显示本次会话最近一次分析结果
pub fn show_last_result(session: &Session) -> Result<String, String> {
    session
        .last_completed()
        .map(render_result)
        .ok_or_else(|| "本次会话还没有完成的分析".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TrendPolicy;
    use tempfile::tempdir;

    #[test]
    fn test_draft_editing() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(dir.path(), TrendPolicy::default());

        set_symptoms(&mut session, " 久坐后腰痛 ");
        assert_eq!(session.draft().symptoms, "久坐后腰痛");

        assert!(set_pain(&mut session, "12").is_err());
        assert_eq!(set_pain(&mut session, "6").unwrap(), "疼痛等级: 6/10");
        assert_eq!(session.draft().pain_level, Some(6));
        set_pain(&mut session, "none").unwrap();
        assert_eq!(session.draft().pain_level, None);

        assert!(set_image(&mut session, "/nonexistent/xray.jpg").is_err());
        let image = dir.path().join("xray.jpg");
        std::fs::write(&image, b"jpeg").unwrap();
        set_image(&mut session, image.to_str().unwrap()).unwrap();
        assert!(show_draft(&session).contains("xray.jpg"));
    }

    #[test]
    fn test_no_result_yet() {
        let dir = tempdir().unwrap();
        let session = Session::open(dir.path(), TrendPolicy::default());
        assert!(show_last_result(&session).is_err());
    }
}
