//! DeepL 翻译服务

use async_trait::async_trait;
use serde_json::json;

use super::{extract_text, send_json, trim_base, TranslationProvider};
use crate::translation::config::{constants, ProviderSettings};
use crate::translation::error::ProviderError;

#[derive(Debug, Clone)]
pub struct DeepLProvider {
    name: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl DeepLProvider {
    pub fn new(name: &str, settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: trim_base(
                settings
                    .base_url
                    .as_deref()
                    .unwrap_or(constants::DEEPL_API_BASE),
            )
            .to_string(),
            client,
        }
    }
}

#[async_trait]
impl TranslationProvider for DeepLProvider {
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
        let target = to.ok_or_else(|| ProviderError::transport(&self.name, "缺少目标语言"))?;

        let mut body = json!({
            "text": [text],
            "target_lang": target.to_uppercase(),
        });
        if let Some(source) = from {
            body["source_lang"] = json!(source.to_uppercase());
        }

        let request = self
            .client
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", api_key))
            .json(&body);

        let response = send_json(&self.name, request).await?;
        extract_text(&self.name, &response, "/translations/0/text")
    }
}
