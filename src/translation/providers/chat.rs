//! 对话补全风格的翻译服务
//!
//! OpenAI 与 DeepSeek 使用相同的 `/chat/completions` 协议，只是默认地址和模型不同。

use async_trait::async_trait;
use serde_json::json;

use super::{extract_text, send_json, trim_base, TranslationProvider};
use crate::translation::config::{constants, ProviderSettings};
use crate::translation::error::ProviderError;

const SYSTEM_PROMPT: &str = "You are a professional translator. Preserve original HTML tags, \
template variables, tokens such as :count, printf tokens such as %s, and double-underscore \
placeholders (e.g. __AI_HTML_0__) exactly as provided.";

/// 对话补全服务
#[derive(Debug, Clone)]
pub struct ChatCompletionProvider {
    name: String,
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl ChatCompletionProvider {
    pub fn openai(name: &str, settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self::with_defaults(
            name,
            settings,
            client,
            constants::OPENAI_API_BASE,
            constants::OPENAI_MODEL,
        )
    }

    pub fn deepseek(name: &str, settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self::with_defaults(
            name,
            settings,
            client,
            constants::DEEPSEEK_API_BASE,
            constants::DEEPSEEK_MODEL,
        )
    }

    fn with_defaults(
        name: &str,
        settings: &ProviderSettings,
        client: reqwest::Client,
        base_url: &str,
        model: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: settings.model.clone().unwrap_or_else(|| model.to_string()),
            base_url: trim_base(settings.base_url.as_deref().unwrap_or(base_url)).to_string(),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// 用户消息：显式给出源语言、目标语言和待译文本
pub fn build_user_prompt(text: &str, from: Option<&str>, to: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(from) = from {
        parts.push(format!("Source language: {}", from));
    }
    if let Some(to) = to {
        parts.push(format!("Target language: {}", to));
    }
    parts.push("Text to translate:".to_string());
    parts.push(text.to_string());
    parts.push(
        "Respond with only the translated text. Keep tokens like __AI_*__, :placeholders, \
         and template syntax unchanged."
            .to_string(),
    );
    parts.join("\n\n")
}

#[async_trait]
impl TranslationProvider for ChatCompletionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(
        &self,
        text: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials(&self.name))?;

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(text, from, to)},
            ],
            "temperature": constants::CHAT_TEMPERATURE,
        });

        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body);

        let response = send_json(&self.name, request).await?;
        let content = extract_text(&self.name, &response, "/choices/0/message/content")?;
        Ok(content.trim().to_string())
    }
}
