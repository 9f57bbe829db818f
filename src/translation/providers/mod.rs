//! 翻译服务适配器
//!
//! 所有服务实现同一个 [`TranslationProvider`] trait，启动时按配置构建一次，
//! 放进 [`ProviderRegistry`]，之后按名称查找。
//!
//! - `chat`: 对话补全风格（OpenAI、DeepSeek）
//! - `deepl`: DeepL 翻译接口
//! - `google`: Google Cloud Translation v2

pub mod chat;
pub mod deepl;
pub mod google;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use chat::ChatCompletionProvider;
pub use deepl::DeepLProvider;
pub use google::GoogleProvider;

use crate::translation::config::{ProviderSettings, TranslatorConfig};
use crate::translation::error::{ProviderError, TranslationError, TranslationResult};

/// 翻译服务
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 注册名称
    fn name(&self) -> &str;

    /// 翻译一段文本，源语言或目标语言缺省时由服务自行判断
    async fn translate(
        &self,
        text: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<String, ProviderError>;
}

/// 按注册顺序保存的服务表
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<(String, Arc<dyn TranslationProvider>)>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置构建全部服务
    pub fn from_config(config: &TranslatorConfig) -> TranslationResult<Self> {
        let mut registry = Self::new();
        for (name, settings) in config.resolved_providers() {
            let provider = build_provider(&name, &settings)?;
            registry.register(provider);
        }
        tracing::debug!("已注册翻译服务: {:?}", registry.names());
        Ok(registry)
    }

    /// 注册服务，同名服务会被替换但保留原位置
    pub fn register(&mut self, provider: Arc<dyn TranslationProvider>) {
        let name = provider.name().to_string();
        match self.providers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = provider,
            None => self.providers.push((name, provider)),
        }
    }

    pub fn with(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TranslationProvider>> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// 根据服务类型构建实例
pub fn build_provider(
    name: &str,
    settings: &ProviderSettings,
) -> TranslationResult<Arc<dyn TranslationProvider>> {
    let client = http_client(settings.timeout())?;
    let provider: Arc<dyn TranslationProvider> = match settings.kind_or(name) {
        "openai" => Arc::new(ChatCompletionProvider::openai(name, settings, client)),
        "deepseek" => Arc::new(ChatCompletionProvider::deepseek(name, settings, client)),
        "deepl" => Arc::new(DeepLProvider::new(name, settings, client)),
        "google" => Arc::new(GoogleProvider::new(name, settings, client)),
        other => {
            return Err(TranslationError::ConfigError(format!(
                "未知的翻译服务类型 '{}' (服务 '{}')",
                other, name
            )))
        }
    };
    Ok(provider)
}

fn http_client(timeout: Duration) -> TranslationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("langsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TranslationError::ConfigError(format!("创建 HTTP 客户端失败: {}", e)))
}

/// 发送请求并把成功响应解析为 JSON
pub(crate) async fn send_json(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::malformed(provider, e))
}

/// 按 JSON 指针取出非空字符串
pub(crate) fn extract_text(provider: &str, body: &Value, pointer: &str) -> Result<String, ProviderError> {
    match body.pointer(pointer).and_then(Value::as_str) {
        Some(text) => Ok(text.to_string()),
        None => Err(ProviderError::malformed(
            provider,
            format!("响应中缺少 {}", pointer),
        )),
    }
}

/// 去掉末尾斜杠，便于拼接路径
pub(crate) fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl TranslationProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn translate(
            &self,
            text: &str,
            _from: Option<&str>,
            _to: Option<&str>,
        ) -> Result<String, ProviderError> {
            Ok(text.to_string())
        }
    }

    #[test]
    fn test_registry_keeps_registration_order() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(Named("deepl")))
            .with(Arc::new(Named("openai")))
            .with(Arc::new(Named("deepl")));

        assert_eq!(registry.names(), vec!["deepl", "openai"]);
        assert!(registry.contains("openai"));
        assert!(registry.get("google").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_from_config() {
        let config = TranslatorConfig::default();
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.names(), vec!["openai", "deepseek", "deepl", "google"]);
    }

    #[test]
    fn test_build_provider_with_alias() {
        let settings = ProviderSettings {
            kind: Some("deepseek".to_string()),
            ..ProviderSettings::default()
        };
        let provider = build_provider("cheap", &settings).unwrap();
        assert_eq!(provider.name(), "cheap");

        let unknown = ProviderSettings {
            kind: Some("babel".to_string()),
            ..ProviderSettings::default()
        };
        assert!(build_provider("babel", &unknown).is_err());
    }

    #[test]
    fn test_extract_text() {
        let body = serde_json::json!({"choices": [{"message": {"content": "Merhaba"}}]});
        assert_eq!(
            extract_text("openai", &body, "/choices/0/message/content").unwrap(),
            "Merhaba"
        );

        let err = extract_text("openai", &serde_json::json!({"choices": []}), "/choices/0/message/content")
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
        assert_eq!(err.provider(), "openai");
    }
}
