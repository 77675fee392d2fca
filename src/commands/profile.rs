//! 患者档案命令

use crate::report::render_profile;
use crate::session::Session;

/// 显示档案
pub fn show_profile(session: &Session) -> String {
    render_profile(session.profile())
}

/// 修改一个档案字段并保存
pub fn update_profile(session: &mut Session, key: &str, value: &str) -> Result<String, String> {
    session
        .set_profile_field(key, value)
        .map_err(|e| e.to_string())?;

    let mut message = format!("档案已保存: {} = {}", key, value.trim());
    if matches!(key, "height" | "weight") {
        if let Some(bmi) = session.profile().bmi() {
            message.push_str(&format!("（BMI: {:.1}）", bmi));
        }
    }
    Ok(message)
}
