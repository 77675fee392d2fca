// LLM模块 - 管理AI诊断服务

pub mod gemini;
pub mod image;
pub mod openai;
pub mod plugin;

pub use gemini::GeminiProvider;
pub use self::image::prepare_image;
pub use openai::OpenAIProvider;
pub use plugin::{ImageAttachment, LLMProvider, ProviderCapabilities};

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// API key 为空时读取的环境变量
pub const API_KEY_ENV: &str = "SPINE_ADVISOR_API_KEY";

/// LLM管理器
pub struct LLMManager {
    /// 当前使用的提供商
    provider: Box<dyn LLMProvider>,
    /// 当前配置
    config: LLMConfig,
    /// HTTP 客户端（所有 provider 共用）
    http_client: Option<reqwest::Client>,
}

/// LLM配置
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMConfig {
    /// 当前使用的 provider: "gemini" 或 "openai"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Gemini配置
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// OpenAI 兼容接口配置
    #[serde(default)]
    pub openai: OpenAIConfig,
    /// 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 可选的代理地址，例如 http://127.0.0.1:7890
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            gemini: GeminiConfig::default(),
            openai: OpenAIConfig::default(),
            request_timeout_secs: default_timeout_secs(),
            proxy: None,
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Gemini配置
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

pub(crate) fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

pub(crate) fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// OpenAI 兼容接口配置
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

pub(crate) fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub(crate) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// 配置中的 API key 为空时回退到环境变量
pub(crate) fn resolve_api_key(configured: &str) -> Option<String> {
    let trimmed = configured.trim();
    if !trimmed.is_empty() {
        return Some(trimmed.to_string());
    }
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 根据配置创建 HTTP 客户端
pub fn build_http_client(config: &LLMConfig) -> Result<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs.max(1)));

    if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        builder = builder.proxy(reqwest::Proxy::all(proxy.trim())?);
        info!("LLM 请求使用代理: {}", proxy);
    }

    Ok(builder.build()?)
}

impl LLMManager {
    /// 按配置创建LLM管理器
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = build_http_client(&config)?;
        let provider = Self::create_provider(&config, client.clone())?;

        Ok(Self {
            provider,
            config,
            http_client: Some(client),
        })
    }

    /// 使用自定义提供商创建（不经过 HTTP 客户端）
    pub fn with_provider(config: LLMConfig, provider: Box<dyn LLMProvider>) -> Self {
        Self {
            provider,
            config,
            http_client: None,
        }
    }

    fn create_provider(config: &LLMConfig, client: reqwest::Client) -> Result<Box<dyn LLMProvider>> {
        let mut provider: Box<dyn LLMProvider> = match config.provider.as_str() {
            "gemini" => Box::new(GeminiProvider::new(client)),
            // "qwen" 是通义千问兼容模式的别名
            "openai" | "qwen" => Box::new(OpenAIProvider::new(client)),
            other => return Err(anyhow!("不支持的 provider: {}", other)),
        };

        let provider_config = match provider.name() {
            "gemini" => serde_json::to_value(&config.gemini)?,
            _ => serde_json::to_value(&config.openai)?,
        };
        provider.configure(provider_config)?;

        Ok(provider)
    }

    /// 应用新配置（超时或代理变化时重建 HTTP 客户端）
    pub fn configure(&mut self, config: LLMConfig) -> Result<()> {
        let client = match &self.http_client {
            Some(client)
                if config.request_timeout_secs == self.config.request_timeout_secs
                    && config.proxy == self.config.proxy =>
            {
                client.clone()
            }
            _ => build_http_client(&config)?,
        };

        info!(
            "切换 LLM provider: {} -> {}",
            self.config.provider, config.provider
        );
        self.provider = Self::create_provider(&config, client.clone())?;
        self.http_client = Some(client);
        self.config = config;
        Ok(())
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// 发送诊断请求，返回模型输出的原始文本
    pub async fn diagnose(&self, prompt: &str, image: Option<&ImageAttachment>) -> Result<String> {
        if !self.provider.is_configured() {
            return Err(anyhow!(
                "{} API key未配置，请在配置文件中设置或设置环境变量 {}",
                self.provider.name(),
                API_KEY_ENV
            ));
        }

        if image.is_some() && !self.provider.capabilities().vision_support {
            return Err(anyhow!("{} 不支持影像分析", self.provider.name()));
        }

        info!(
            "使用 {} 进行诊断分析（附带影像: {}）",
            self.provider.name(),
            image.is_some()
        );
        let start_time = Instant::now();

        match self.provider.generate(prompt, image).await {
            Ok(text) => {
                info!(
                    "诊断分析完成，耗时 {} ms，返回 {} 字符",
                    start_time.elapsed().as_millis(),
                    text.len()
                );
                Ok(text)
            }
            Err(e) => {
                error!("诊断分析失败: {}", e);
                Err(e)
            }
        }
    }
}
