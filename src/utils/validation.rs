//! 输入验证工具函数
//!
//! 在提交分析前检查用户输入，错误以文本形式直接显示给用户

use std::path::{Path, PathBuf};

use crate::llm::image::SUPPORTED_EXTENSIONS;

/// 解析疼痛等级（0-10 的整数）
///
/// # 参数
/// - `input`: 用户输入的文本
///
/// # 返回
/// - `Ok(level)`: 验证通过
/// - `Err(String)`: 错误信息
pub fn parse_pain_level(input: &str) -> Result<u8, String> {
    let trimmed = input.trim();
    let level: u8 = trimmed
        .parse()
        .map_err(|_| format!("疼痛等级必须是 0-10 的整数: {}", trimmed))?;
    if level > 10 {
        return Err(format!("疼痛等级必须是 0-10 的整数: {}", level));
    }
    Ok(level)
}

/// 验证影像文件路径：文件存在且扩展名受支持
pub fn validate_image_path(input: &str) -> Result<PathBuf, String> {
    let path = Path::new(input.trim());
    if !path.is_file() {
        return Err(format!("影像文件不存在: {}", path.display()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!(
            "不支持的影像格式: {}（支持: {}）",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        ));
    }

    Ok(path.to_path_buf())
}
