// 集成测试公共模块
//
// 提供测试用翻译服务、临时语言目录和管理器构建工具

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use langsync::translation::config::TranslatorConfig;
use langsync::translation::error::ProviderError;
use langsync::translation::providers::{ProviderRegistry, TranslationProvider};
use langsync::translation::storage::TranslationCache;
use langsync::translation::TranslationManager;

/// 测试用服务：返回 `[<to>] <text>`，并记录调用次数
pub struct FakeProvider {
    name: String,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到的（已屏蔽的）文本
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, _from: Option<&str>, to: Option<&str>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        Ok(format!("[{}] {}", to.unwrap_or("?"), text))
    }
}

/// 总是失败的服务，模拟缺少凭据
pub struct FailingProvider {
    name: String,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, _text: &str, _from: Option<&str>, _to: Option<&str>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::missing_credentials(&self.name))
    }
}

/// 在指定文本上失败，其余文本正常翻译
pub struct SelectiveProvider {
    name: String,
    poison: String,
}

impl SelectiveProvider {
    pub fn new(name: &str, poison: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            poison: poison.to_string(),
        })
    }
}

#[async_trait]
impl TranslationProvider for SelectiveProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, _from: Option<&str>, to: Option<&str>) -> Result<String, ProviderError> {
        if text == self.poison {
            return Err(ProviderError::transport(&self.name, "connection reset"));
        }
        Ok(format!("[{}] {}", to.unwrap_or("?"), text))
    }
}

/// 前 `failures` 次调用返回传输错误，之后正常翻译
pub struct FlakyProvider {
    name: String,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyProvider {
    pub fn new(name: &str, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for FlakyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, _from: Option<&str>, to: Option<&str>) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ProviderError::transport(&self.name, "connection reset"));
        }
        Ok(format!("[{}] {}", to.unwrap_or("?"), text))
    }
}

/// 临时项目目录
pub struct TestEnvironment {
    pub dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("创建临时目录失败"),
        }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn write_json(&self, relative: &str, value: &Value) {
        self.write(relative, &serde_json::to_string_pretty(value).unwrap());
    }

    pub fn read_json(&self, relative: &str) -> Value {
        let content = std::fs::read_to_string(self.path(relative)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// 以临时目录为根、只使用 `fake` 服务的配置
    pub fn config(&self) -> TranslatorConfig {
        let mut config = TranslatorConfig::with_base_path(self.base());
        config.provider = "fake".to_string();
        config.fallback_order = Vec::new();
        config.state_dir = self.path("state");
        config
    }
}

/// 管理器构建器
pub struct ManagerBuilder {
    config: TranslatorConfig,
    registry: ProviderRegistry,
    cache: TranslationCache,
}

impl ManagerBuilder {
    pub fn new(env: &TestEnvironment) -> Self {
        Self {
            config: env.config(),
            registry: ProviderRegistry::new(),
            cache: TranslationCache::memory(),
        }
    }

    pub fn config(mut self, update: impl FnOnce(&mut TranslatorConfig)) -> Self {
        update(&mut self.config);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.registry.register(provider);
        self
    }

    pub fn cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(self) -> TranslationManager {
        TranslationManager::with_parts(self.config, self.registry, self.cache)
    }
}
