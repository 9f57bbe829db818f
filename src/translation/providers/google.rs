//! Google Cloud Translation v2

use async_trait::async_trait;
use serde_json::json;

use super::{extract_text, send_json, trim_base, TranslationProvider};
use crate::translation::config::{constants, ProviderSettings};
use crate::translation::error::ProviderError;

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    name: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(name: &str, settings: &ProviderSettings, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: trim_base(
                settings
                    .base_url
                    .as_deref()
                    .unwrap_or(constants::GOOGLE_API_BASE),
            )
            .to_string(),
            client,
        }
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
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

        let mut body = json!({
            "q": text,
            "target": to,
            "format": "text",
        });
        if let Some(source) = from {
            body["source"] = json!(source);
        }

        let request = self
            .client
            .post(&self.base_url)
            .query(&[("key", api_key)])
            .json(&body);

        let response = send_json(&self.name, request).await?;
        let translated = extract_text(&self.name, &response, "/data/translations/0/translatedText")?;
        Ok(decode_entities(&translated))
    }
}

/// 解码 Google 返回的 HTML 实体
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
