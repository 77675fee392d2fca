//! 配置管理命令
//!
//! 提供应用配置的读取和按键更新，包括：
//! - LLM 服务商与 API key
//! - 趋势判定容差
//! - 影像处理设置

use crate::actors::LLMHandle;
use crate::models::{AppConfig, PersistedAppConfig};
use crate::settings::SettingsManager;
use tracing::info;

/// 可通过 `config set` 修改的配置项
pub const CONFIG_KEYS: [&str; 15] = [
    "provider",
    "gemini.api_key",
    "gemini.model",
    "gemini.base_url",
    "openai.api_key",
    "openai.model",
    "openai.base_url",
    "request_timeout_secs",
    "proxy",
    "data_dir",
    "trend.angle_tolerance",
    "trend.pain_tolerance",
    "image.max_dimension",
    "image.jpeg_quality",
    "repair_malformed_json",
];

/// 隐藏 API key 中间部分
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => String::new(),
        1..=8 => "****".to_string(),
        n => format!(
            "{}****{}",
            chars[..4].iter().collect::<String>(),
            chars[n - 4..].iter().collect::<String>()
        ),
    }
}

fn parse_tolerance(key: &str, value: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| format!("{} 必须是不小于 0 的数字: {}", key, value))
}

/// 把一个 key=value 转换为部分更新
pub fn build_update(
    current: &PersistedAppConfig,
    key: &str,
    value: &str,
) -> Result<AppConfig, String> {
    let value = value.trim();
    let mut update = AppConfig::default();
    let mut llm = current.llm_config.clone();

    match key {
        "provider" => {
            if !matches!(value, "gemini" | "openai" | "qwen") {
                return Err(format!("不支持的 provider: {}（可选: gemini, openai, qwen）", value));
            }
            llm.provider = value.to_string();
        }
        "gemini.api_key" => llm.gemini.api_key = value.to_string(),
        "gemini.model" => llm.gemini.model = value.to_string(),
        "gemini.base_url" => llm.gemini.base_url = value.to_string(),
        "openai.api_key" => llm.openai.api_key = value.to_string(),
        "openai.model" => llm.openai.model = value.to_string(),
        "openai.base_url" => llm.openai.base_url = value.to_string(),
        "request_timeout_secs" => {
            llm.request_timeout_secs = value
                .parse::<u64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| format!("request_timeout_secs 必须是正整数: {}", value))?;
        }
        "proxy" => llm.proxy = Some(value.to_string()).filter(|v| !v.is_empty()),
        "data_dir" => update.data_dir = Some(value.to_string()),
        "trend.angle_tolerance" | "trend.pain_tolerance" => {
            let tolerance = parse_tolerance(key, value)?;
            let mut policy = current.trend_policy;
            if key == "trend.angle_tolerance" {
                policy.angle_tolerance = tolerance;
            } else {
                policy.pain_tolerance = tolerance;
            }
            update.trend_policy = Some(policy);
        }
        "image.max_dimension" => {
            let mut settings = current.image_settings.clone();
            settings.max_dimension = value
                .parse::<u32>()
                .ok()
                .filter(|v| *v >= 64)
                .ok_or_else(|| format!("image.max_dimension 必须是不小于 64 的整数: {}", value))?;
            update.image_settings = Some(settings);
        }
        "image.jpeg_quality" => {
            let mut settings = current.image_settings.clone();
            settings.jpeg_quality = value
                .parse::<u8>()
                .ok()
                .filter(|v| (1..=100).contains(v))
                .ok_or_else(|| format!("image.jpeg_quality 必须在 1-100 之间: {}", value))?;
            update.image_settings = Some(settings);
        }
        "repair_malformed_json" => {
            update.repair_malformed_json = Some(
                value
                    .parse::<bool>()
                    .map_err(|_| format!("repair_malformed_json 必须是 true 或 false: {}", value))?,
            );
        }
        other => {
            return Err(format!(
                "未知的配置项: {}（可用: {}）",
                other,
                CONFIG_KEYS.join(", ")
            ))
        }
    }

    if llm != current.llm_config {
        update.llm_config = Some(llm);
    }
    Ok(update)
}

/// 获取应用配置（API key 已隐藏）
pub async fn get_app_config(settings: &SettingsManager) -> Result<String, String> {
    let mut config = settings.get().await;
    config.llm_config.gemini.api_key = mask_secret(&config.llm_config.gemini.api_key);
    config.llm_config.openai.api_key = mask_secret(&config.llm_config.openai.api_key);

    let json = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
    Ok(format!("配置文件: {}\n{}", settings.path().display(), json))
}

/// 更新一个配置项，LLM 配置变化时立即应用
pub async fn update_config(
    settings: &SettingsManager,
    llm: Option<&LLMHandle>,
    key: &str,
    value: &str,
) -> Result<String, String> {
    let current = settings.get().await;
    let update = build_update(&current, key, value)?;
    let llm_config = update.llm_config.clone();
    let needs_restart = update.data_dir.is_some()
        || update.trend_policy.is_some()
        || update.image_settings.is_some()
        || update.repair_malformed_json.is_some();

    settings.update(update).await.map_err(|e| e.to_string())?;
    info!("配置项已更新: {}", key);

    if let (Some(config), Some(handle)) = (llm_config, llm) {
        handle
            .configure(config)
            .await
            .map_err(|e| format!("配置已保存，但应用 LLM 配置失败: {}", e))?;
    }

    if needs_restart {
        Ok(format!("已保存 {}（重新启动后生效）", key))
    } else {
        Ok(format!("已保存 {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("AIzaSyExample1234"), "AIza****1234");
    }

    #[test]
    fn test_build_update() {
        let current = PersistedAppConfig::default();

        let update = build_update(&current, "provider", "openai").unwrap();
        assert_eq!(update.llm_config.unwrap().provider, "openai");

        let update = build_update(&current, "trend.angle_tolerance", "0.5").unwrap();
        assert_eq!(update.trend_policy.unwrap().angle_tolerance, 0.5);
        assert!(update.llm_config.is_none());

        let update = build_update(&current, "repair_malformed_json", "true").unwrap();
        assert_eq!(update.repair_malformed_json, Some(true));

        assert!(build_update(&current, "provider", "claude").is_err());
        assert!(build_update(&current, "trend.pain_tolerance", "-1").is_err());
        assert!(build_update(&current, "image.jpeg_quality", "0").is_err());
        assert!(build_update(&current, "no.such.key", "1").is_err());
    }

    #[tokio::test]
    async fn test_update_config_persists_and_masks() {
        let dir = tempdir().unwrap();
        let settings = SettingsManager::new(dir.path().join("config.json"))
            .await
            .unwrap();

        update_config(&settings, None, "gemini.api_key", "AIzaSyExample1234")
            .await
            .unwrap();
        assert_eq!(
            settings.get().await.llm_config.gemini.api_key,
            "AIzaSyExample1234"
        );

        let shown = get_app_config(&settings).await.unwrap();
        assert!(shown.contains("AIza****1234"));
        assert!(!shown.contains("AIzaSyExample1234"));

        let message = update_config(&settings, None, "image.max_dimension", "1024")
            .await
            .unwrap();
        assert!(message.contains("重新启动后生效"));
    }
}
