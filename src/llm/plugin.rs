// LLM插件系统 - 定义提供商接口和数据结构

use anyhow::Result;
use async_trait::async_trait;

/// 随提示词一起发送的影像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// 原始文件名（仅用于日志）
    pub file_name: String,
    /// MIME 类型，例如 image/jpeg
    pub mime_type: String,
    /// base64 编码后的内容
    pub data_base64: String,
}

impl ImageAttachment {
    /// data URL 形式（OpenAI 兼容接口使用）
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

/// LLM提供商接口
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// 获取提供商名称
    fn name(&self) -> &str;

    /// 配置提供商
    ///
    /// # 参数
    /// * `config` - JSON格式的配置
    fn configure(&mut self, config: serde_json::Value) -> Result<()>;

    /// 检查提供商是否已配置
    fn is_configured(&self) -> bool;

    /// 获取支持的功能
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    /// 发送提示词（可附带一张影像），返回模型输出的原始文本
    ///
    /// # 参数
    /// * `prompt` - 文本提示词
    /// * `image` - 可选的影像
    async fn generate(&self, prompt: &str, image: Option<&ImageAttachment>) -> Result<String>;
}

/// 提供商能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// 是否支持视觉分析
    pub vision_support: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            vision_support: true,
        }
    }
}
