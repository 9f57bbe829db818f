//! 翻译服务适配器集成测试
//!
//! 使用 wiremock 模拟各服务的 HTTP 接口

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use langsync::translation::config::ProviderSettings;
use langsync::translation::core::{TranslationPerformer, TranslationRequest};
use langsync::translation::error::ProviderError;
use langsync::translation::providers::{build_provider, ProviderRegistry};
use langsync::translation::storage::TranslationCache;
use langsync::translation::TranslationError;

fn settings(kind: &str, server: &MockServer, api_key: Option<&str>) -> ProviderSettings {
    ProviderSettings {
        kind: Some(kind.to_string()),
        api_key: api_key.map(str::to_string),
        base_url: Some(server.uri()),
        timeout_secs: Some(5),
        ..ProviderSettings::default()
    }
}

#[tokio::test]
async fn test_chat_completion_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-test" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Merhaba  \n" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = settings("openai", &server, Some("sk-test"));
    config.model = Some("gpt-test".to_string());
    let provider = build_provider("openai", &config).unwrap();

    let translated = provider.translate("Hello", Some("en"), Some("tr")).await.unwrap();
    assert_eq!(translated, "Merhaba");
}

#[tokio::test]
async fn test_deepseek_uses_chat_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "deepseek-chat" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Hola" } }]
        })))
        .mount(&server)
        .await;

    let provider = build_provider("deepseek", &settings("deepseek", &server, Some("ds-key"))).unwrap();
    assert_eq!(provider.translate("Hello", None, Some("es")).await.unwrap(), "Hola");
}

#[tokio::test]
async fn test_deepl_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(header("authorization", "DeepL-Auth-Key dl-key"))
        .and(body_partial_json(json!({
            "text": ["Goodbye"],
            "target_lang": "DE",
            "source_lang": "EN"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{ "detected_source_language": "EN", "text": "Auf Wiedersehen" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = build_provider("deepl", &settings("deepl", &server, Some("dl-key"))).unwrap();
    let translated = provider.translate("Goodbye", Some("en"), Some("de")).await.unwrap();
    assert_eq!(translated, "Auf Wiedersehen");
}

/// Google 返回的 HTML 实体会被解码
#[tokio::test]
async fn test_google_decodes_entities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({ "q": "Tom's cart", "target": "fr", "format": "text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "translations": [{ "translatedText": "Le panier de Tom&#39;s &amp; co" }] }
        })))
        .mount(&server)
        .await;

    let provider = build_provider("google", &settings("google", &server, Some("g-key"))).unwrap();
    let translated = provider.translate("Tom's cart", Some("en"), Some("fr")).await.unwrap();
    assert_eq!(translated, "Le panier de Tom's & co");
}

#[tokio::test]
async fn test_error_conditions_are_distinguishable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "translations": [] })))
        .mount(&server)
        .await;

    let missing = build_provider("openai", &settings("openai", &server, None)).unwrap();
    assert_eq!(
        missing.translate("Hello", Some("en"), Some("tr")).await.unwrap_err(),
        ProviderError::missing_credentials("openai")
    );

    let blank = build_provider("openai", &settings("openai", &server, Some("  "))).unwrap();
    assert!(matches!(
        blank.translate("Hello", Some("en"), Some("tr")).await,
        Err(ProviderError::MissingCredentials { .. })
    ));

    let limited = build_provider("openai", &settings("openai", &server, Some("sk-test"))).unwrap();
    match limited.translate("Hello", Some("en"), Some("tr")).await {
        Err(ProviderError::Http { provider, status, body }) => {
            assert_eq!(provider, "openai");
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let deepl = build_provider("deepl", &settings("deepl", &server, Some("dl-key"))).unwrap();
    assert!(matches!(
        deepl.translate("Hello", Some("en"), Some("tr")).await,
        Err(ProviderError::MalformedResponse { .. })
    ));
}

/// 端口上没有服务在监听时返回传输错误
#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ProviderSettings {
        kind: Some("deepl".to_string()),
        api_key: Some("dl-key".to_string()),
        base_url: Some(format!("http://127.0.0.1:{}", port)),
        timeout_secs: Some(5),
        ..ProviderSettings::default()
    };

    let provider = build_provider("deepl", &config).unwrap();
    assert!(matches!(
        provider.translate("Hello", Some("en"), Some("tr")).await,
        Err(ProviderError::Transport { .. })
    ));
}

#[test]
fn test_unknown_kind_is_rejected() {
    let config = ProviderSettings {
        kind: Some("babelfish".to_string()),
        ..ProviderSettings::default()
    };
    assert!(matches!(
        build_provider("custom", &config),
        Err(TranslationError::ConfigError(_))
    ));
}

/// 第一个服务失败时回退到下一个，缓存记在成功的服务名下
#[tokio::test]
async fn test_fallback_between_real_adapters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{ "text": "Hallo :name" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ProviderRegistry::new()
        .with(build_provider("openai", &settings("openai", &server, Some("sk-test"))).unwrap())
        .with(build_provider("deepl", &settings("deepl", &server, Some("dl-key"))).unwrap());
    let cache = TranslationCache::memory();
    let performer = TranslationPerformer::new(registry, cache.clone());
    let order = vec!["openai".to_string(), "deepl".to_string()];
    let request = TranslationRequest {
        text: "Hello :name",
        from: "en",
        to: "de",
        providers: &order,
    };

    // deepl 的回复丢失了占位符标记，结果退回原文
    let first = performer.perform(request).await.unwrap();
    assert_eq!(first.provider, "deepl");
    assert!(first.degraded);
    assert_eq!(first.translation, "Hello :name");

    // openai 没有缓存，仍会先调用一次，随后命中 deepl 的缓存
    let second = performer.perform(request).await.unwrap();
    assert!(second.cache_hit);
    assert!(second.degraded);
    assert_eq!(second.provider, "deepl");
    assert_eq!(performer.stats().snapshot().provider_failures, 2);

    let normalized = langsync::translation::masking::mask("Hello :name").normalized;
    assert!(cache.get("deepl", "en", "de", &normalized).is_some());
    assert!(cache.get("openai", "en", "de", &normalized).is_none());
}
