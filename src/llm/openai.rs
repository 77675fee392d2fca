// OpenAI 兼容接口提供商实现（OpenAI、通义千问兼容模式等）

use super::plugin::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

/// 已知只支持文本的模型前缀
const TEXT_ONLY_MODEL_PREFIXES: [&str; 8] = [
    "gpt-3.5",
    "qwen-turbo",
    "qwen-plus",
    "qwen-max",
    "qwen-long",
    "deepseek-chat",
    "deepseek-reasoner",
    "o3-mini",
];

/// OpenAI 兼容提供商
pub struct OpenAIProvider {
    api_key: Option<String>,
    model: String,
    client: Client,
    base_url: String,
}

impl OpenAIProvider {
    /// 创建新的提供商（接受共享的HTTP客户端以复用连接池）
    pub fn new(client: Client) -> Self {
        Self {
            api_key: None,
            model: super::default_openai_model(),
            client,
            base_url: super::default_openai_base_url(),
        }
    }

    /// 设置API密钥
    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// 设置模型
    pub fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn build_request_body(&self, prompt: &str, image: Option<&ImageAttachment>) -> serde_json::Value {
        let mut content_parts = vec![];

        if let Some(image) = image {
            content_parts.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": image.data_url()
                }
            }));
        }

        // 添加文本提示
        content_parts.push(json!({
            "type": "text",
            "text": prompt
        }));

        json!({
            "model": self.model,
            "response_format": {"type": "json_object"},  // 保证结构化输出
            "messages": [
                {
                    "role": "user",
                    "content": content_parts
                }
            ],
            "max_tokens": 4000,
            "temperature": 0.3
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn configure(&mut self, config: serde_json::Value) -> Result<()> {
        if let Some(api_key) = config.get("api_key").and_then(|v| v.as_str()) {
            if let Some(key) = super::resolve_api_key(api_key) {
                self.set_api_key(key);
            }
        }
        if let Some(model) = config.get("model").and_then(|v| v.as_str()) {
            if !model.trim().is_empty() {
                self.set_model(model.trim().to_string());
            }
        }
        if let Some(base_url) = config.get("base_url").and_then(|v| v.as_str()) {
            if !base_url.trim().is_empty() {
                self.base_url = base_url.trim().to_string();
            }
        }
        info!(
            "OpenAI 兼容接口配置已更新: model={}, base_url={}",
            self.model, self.base_url
        );
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        let model = self.model.to_lowercase();
        ProviderCapabilities {
            vision_support: !TEXT_ONLY_MODEL_PREFIXES
                .iter()
                .any(|prefix| model.starts_with(prefix)),
        }
    }

    async fn generate(&self, prompt: &str, image: Option<&ImageAttachment>) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("API key未配置，请先配置 API key"))?;

        let request_body = self.build_request_body(prompt, image);
        debug!(
            "调用OpenAI兼容接口: model={}, base_url={}",
            self.model, self.base_url
        );

        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            error!("OpenAI兼容接口错误 ({}): {}", status, error_text);
            return Err(anyhow::anyhow!("API调用失败 ({}): {}", status, error_text));
        }

        let response_text = response.text().await?;
        let response_data: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow::anyhow!("无法解析接口响应: {}", e))?;

        let choice = response_data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("接口响应中没有 choices"))?;

        // 如果响应被截断，返回错误而不是不完整的 JSON
        if choice.finish_reason.as_deref() == Some("length") {
            warn!("LLM 响应因达到 token 限制而被截断 (finish_reason=length)");
            return Err(anyhow::anyhow!(
                "LLM 响应被截断（达到 max_tokens 限制）。内容长度: {} 字符",
                choice.message.content.len()
            ));
        }

        Ok(choice.message.content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}
