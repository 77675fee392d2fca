//! 文件系统路径工具
//!
//! 提供跨平台的数据目录、日志目录与配置文件位置

use std::path::PathBuf;

const APP_DIR_NAME: &str = "spine-advisor";

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

/// 获取默认数据目录（跨平台）
///
/// - macOS: ~/Library/Application Support/spine-advisor
/// - Windows: %APPDATA%/spine-advisor
/// - Linux: $XDG_DATA_HOME/spine-advisor 或 ~/.local/share/spine-advisor
pub fn get_app_data_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        home_dir()
            .join("Library/Application Support")
            .join(APP_DIR_NAME)
    } else if cfg!(target_os = "windows") {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join(APP_DIR_NAME)
    } else {
        std::env::var("XDG_DATA_HOME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir().join(".local/share"))
            .join(APP_DIR_NAME)
    }
}

/// 获取日志目录路径（跨平台）
///
/// - macOS: ~/Library/Logs/spine-advisor
/// - 其他平台: 数据目录下的 logs
pub fn get_log_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        home_dir().join("Library/Logs").join(APP_DIR_NAME)
    } else {
        get_app_data_dir().join("logs")
    }
}

/// 默认配置文件位置
pub fn default_config_path() -> PathBuf {
    get_app_data_dir().join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_app_dir() {
        let data_dir = get_app_data_dir();
        assert!(data_dir.ends_with(APP_DIR_NAME));
        assert_eq!(default_config_path(), data_dir.join("config.json"));
        assert!(get_log_dir()
            .components()
            .any(|c| c.as_os_str() == APP_DIR_NAME));
    }
}
