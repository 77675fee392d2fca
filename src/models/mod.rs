// 数据模型模块 - 应用配置结构

use serde::{Deserialize, Serialize};

// 重新导出其他模块的类型
pub use crate::llm::LLMConfig;
pub use crate::storage::{Dynamics, Profile, RiskLevel, TrendPolicy, VisitRecord};

/// 应用配置（部分更新，未设置的字段保持不变）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据目录
    pub data_dir: Option<String>,
    /// LLM配置
    pub llm_config: Option<LLMConfig>,
    /// 趋势判定策略
    pub trend_policy: Option<TrendPolicy>,
    /// 影像设置
    pub image_settings: Option<ImageSettings>,
    /// 是否尝试修复格式错误的 AI 返回
    pub repair_malformed_json: Option<bool>,
}

/// 上传影像的处理设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    /// 最长边上限（像素），超过时缩小
    pub max_dimension: u32,
    /// 重新编码时的 JPEG 质量(1-100)
    pub jpeg_quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            jpeg_quality: 85,
        }
    }
}

/// 持久化的应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAppConfig {
    /// 数据目录（为空时使用系统默认目录）
    #[serde(default)]
    pub data_dir: Option<String>,
    /// LLM配置
    #[serde(default)]
    pub llm_config: LLMConfig,
    /// 趋势判定策略
    #[serde(default)]
    pub trend_policy: TrendPolicy,
    /// 影像设置
    #[serde(default)]
    pub image_settings: ImageSettings,
    /// 是否尝试修复格式错误的 AI 返回（默认关闭，格式错误直接提示用户）
    #[serde(default)]
    pub repair_malformed_json: bool,
}

impl Default for PersistedAppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            llm_config: LLMConfig::default(),
            trend_policy: TrendPolicy::default(),
            image_settings: ImageSettings::default(),
            repair_malformed_json: false,
        }
    }
}
