// Google Gemini 提供商实现 - generateContent 接口，支持内联图片

use super::plugin::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

/// Gemini提供商
pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    /// 创建新的Gemini提供商（接受共享的HTTP客户端以复用连接池）
    pub fn new(client: Client) -> Self {
        Self {
            api_key: None,
            model: super::default_gemini_model(),
            client,
            base_url: super::default_gemini_base_url(),
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

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request_body(prompt: &str, image: Option<&ImageAttachment>) -> serde_json::Value {
        let mut parts = vec![json!({ "text": prompt })];

        if let Some(image) = image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": image.data_base64,
                }
            }));
        }

        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ],
            "generationConfig": {
                "temperature": 0.3,
                "responseMimeType": "application/json"
            }
        })
    }

    /// 从响应中提取文本
    fn extract_text(response: GeminiResponse) -> Result<String> {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_ref())
        {
            return Err(anyhow::anyhow!("Gemini 拒绝了请求: {}", reason));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Gemini 响应中没有候选结果"))?;

        if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
            warn!("Gemini 响应因达到 token 限制而被截断");
        }

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Gemini 返回了空内容 (finish_reason={})",
                candidate.finish_reason.unwrap_or_default()
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
        info!("Gemini 配置已更新: model={}", self.model);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str, image: Option<&ImageAttachment>) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Gemini API key未配置，请先配置 API key"))?;

        let request_body = Self::build_request_body(prompt, image);
        debug!(
            "调用Gemini API: model={}, 附带影像={}",
            self.model,
            image.map(|i| i.file_name.as_str()).unwrap_or("无")
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            error!("Gemini API错误 ({}): {}", status, error_text);
            return Err(anyhow::anyhow!(
                "Gemini API调用失败 ({}): {}",
                status,
                error_text
            ));
        }

        let response_text = response.text().await?;
        let response_data: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow::anyhow!("无法解析 Gemini 响应: {}", e))?;

        Self::extract_text(response_data)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}
