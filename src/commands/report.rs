//! 报告导出命令

use std::path::Path;

use crate::report::{export_report, render_markdown_report};
use crate::session::Session;

/// 把档案和本次会话最近一次分析导出为 Markdown
pub fn export_markdown_report(session: &Session, path: &Path) -> Result<String, String> {
    let completed = session
        .last_completed()
        .ok_or_else(|| "没有可导出的分析结果，请先完成一次分析".to_string())?;

    let markdown = render_markdown_report(session.profile(), completed);
    export_report(path, &markdown).map_err(|e| e.to_string())?;
    Ok(format!("报告已保存: {}", path.display()))
}
