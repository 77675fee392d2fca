//! 就诊历史命令

use tracing::info;

use crate::report::{render_dynamics, render_history};
use crate::session::Session;

/// 列出历史记录（最新的在前），limit 为空时列出全部
pub fn list_history(session: &Session, limit: Option<usize>) -> String {
    let history = session.history();
    let records = match limit {
        Some(n) => history.latest(n),
        None => history.records(),
    };
    render_history(records)
}

/// 病情动态统计与图表数据
pub fn show_dynamics(session: &Session) -> String {
    render_dynamics(&session.summary(), session.history().series_for_chart())
}

/// 清空历史（调用方负责确认）
pub fn clear_history(session: &mut Session) -> Result<String, String> {
    let count = session.history().len();
    session.clear_history().map_err(|e| e.to_string())?;
    info!("用户清空了 {} 条就诊记录", count);
    Ok(format!("已删除 {} 条就诊记录", count))
}
