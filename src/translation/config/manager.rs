//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{helpers, TranslationError, TranslationResult};

/// 单个翻译服务的配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// 服务类型，缺省时取配置表中的名称
    pub kind: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderSettings {
    pub fn kind_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(name)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(constants::DEFAULT_PROVIDER_TIMEOUT)
    }

    /// 用环境变量补全未配置的字段
    fn fill_from_env(&mut self, kind: &str) {
        let (api_key, model, base_url) = crate::env::providers::lookup(kind);
        if self.api_key.is_none() {
            self.api_key = api_key;
        }
        if self.model.is_none() {
            self.model = model;
        }
        if self.base_url.is_none() {
            self.base_url = base_url;
        }
    }
}

/// 缓存后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    Memory,
    Redb,
}

/// 缓存配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub driver: CacheDriver,
    /// redb 文件路径，缺省时放在状态目录下
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: CacheDriver::Redb,
            path: None,
        }
    }
}

/// 队列配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueSettings {
    pub max_concurrent: usize,
    pub workers: usize,
    pub slot_wait_secs: u64,
    pub release_delay_secs: u64,
    pub max_attempts: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent: constants::DEFAULT_QUEUE_MAX_CONCURRENT,
            workers: constants::DEFAULT_QUEUE_WORKERS,
            slot_wait_secs: constants::DEFAULT_SLOT_WAIT.as_secs(),
            release_delay_secs: constants::DEFAULT_RELEASE_DELAY.as_secs(),
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl QueueSettings {
    pub fn slot_wait(&self) -> Duration {
        Duration::from_secs(self.slot_wait_secs)
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_secs(self.release_delay_secs)
    }
}

/// 同步配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// 项目根目录
    pub base_path: PathBuf,
    /// 语言文件根目录，可包含通配符；为空时自动探测 lang/ 或 resources/lang/
    pub paths: Vec<String>,

    /// 默认翻译服务
    pub provider: String,
    /// 回退顺序
    pub fallback_order: Vec<String>,
    /// 服务名称到配置的映射；为空时注册全部内置服务
    pub providers: BTreeMap<String, ProviderSettings>,

    pub auto_create_missing_files: bool,

    pub cache: CacheSettings,
    pub queue: QueueSettings,

    /// 运行状态与报告数据库所在目录
    pub state_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            paths: Vec::new(),
            provider: constants::DEFAULT_PROVIDER.to_string(),
            fallback_order: constants::FALLBACK_PROVIDERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            providers: BTreeMap::new(),
            auto_create_missing_files: true,
            cache: CacheSettings::default(),
            queue: QueueSettings::default(),
            state_dir: PathBuf::from(constants::DEFAULT_STATE_DIR),
            log_file: None,
        }
    }
}

impl TranslatorConfig {
    /// 以指定目录为项目根目录的默认配置
    pub fn with_base_path<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.provider.trim().is_empty() {
            return Err(TranslationError::ConfigError("默认翻译服务不能为空".to_string()));
        }

        if self.queue.max_concurrent == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.queue.workers == 0 {
            return Err(TranslationError::ConfigError("工作协程数不能为0".to_string()));
        }

        if self.queue.max_attempts == 0 {
            return Err(TranslationError::ConfigError("最大尝试次数不能为0".to_string()));
        }

        for (name, settings) in &self.providers {
            let kind = settings.kind_or(name);
            if !constants::BUILTIN_PROVIDERS.contains(&kind) {
                return Err(TranslationError::ConfigError(format!(
                    "未知的翻译服务类型 '{}' (服务 '{}')",
                    kind, name
                )));
            }
            if let Some(url) = &settings.base_url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(TranslationError::ConfigError(format!(
                        "服务 '{}' 的地址必须以 http:// 或 https:// 开头",
                        name
                    )));
                }
            }
        }

        Ok(())
    }

    /// 应用环境变量覆盖，只有显式设置的变量才生效
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, core, queue, translator, EnvVar};

        if let Some(base_path) = translator::BasePath::get_set() {
            self.base_path = PathBuf::from(base_path);
        }

        if let Some(paths) = translator::Paths::get_set() {
            self.paths = paths;
        }

        if let Some(provider) = translator::Provider::get_set() {
            tracing::info!("环境变量覆盖默认翻译服务: {}", provider);
            self.provider = provider;
        }

        if let Some(auto_create) = translator::AutoCreate::get_set() {
            self.auto_create_missing_files = auto_create;
        }

        if let Some(state_dir) = translator::StateDir::get_set() {
            self.state_dir = PathBuf::from(state_dir);
        }

        if let Some(log_file) = core::LogFile::get_set() {
            self.log_file = Some(PathBuf::from(log_file));
        }

        // 缓存相关环境变量
        if let Some(enabled) = cache::Enabled::get_set() {
            self.cache.enabled = enabled;
        }

        if let Some(driver) = cache::Driver::get_set() {
            self.cache.driver = if driver == "memory" {
                CacheDriver::Memory
            } else {
                CacheDriver::Redb
            };
        }

        if let Some(path) = cache::Path::get_set() {
            self.cache.path = Some(PathBuf::from(path));
        }

        // 队列相关环境变量
        if let Some(max_concurrent) = queue::MaxConcurrent::get_set() {
            self.queue.max_concurrent = max_concurrent;
        }

        if let Some(workers) = queue::Workers::get_set() {
            self.queue.workers = workers;
        }

        if let Some(wait) = queue::SlotWait::get_set() {
            self.queue.slot_wait_secs = wait.as_secs();
        }

        if let Some(delay) = queue::ReleaseDelay::get_set() {
            self.queue.release_delay_secs = delay.as_secs();
        }

        if let Some(attempts) = queue::MaxAttempts::get_set() {
            self.queue.max_attempts = attempts;
        }
    }

    /// 解析后的服务配置，按注册顺序排列
    ///
    /// 未配置任何服务时注册全部内置服务，凭据从环境变量读取。
    pub fn resolved_providers(&self) -> Vec<(String, ProviderSettings)> {
        let mut resolved: Vec<(String, ProviderSettings)> = if self.providers.is_empty() {
            constants::BUILTIN_PROVIDERS
                .iter()
                .map(|name| (name.to_string(), ProviderSettings::default()))
                .collect()
        } else {
            self.providers
                .iter()
                .map(|(name, settings)| (name.clone(), settings.clone()))
                .collect()
        };

        for (name, settings) in resolved.iter_mut() {
            let kind = settings.kind_or(name).to_string();
            settings.fill_from_env(&kind);
        }

        resolved
    }

    /// 相对路径以项目根目录为基准
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.resolve_path(&self.state_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        match &self.cache.path {
            Some(path) => self.resolve_path(path),
            None => self.state_dir().join(constants::CACHE_DB_FILE),
        }
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslatorConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();
        let (config, source) = Self::load_config()?;
        Self::finish(config, source)
    }

    /// 从指定文件创建配置管理器
    pub fn from_path<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();
        let path = path.as_ref();
        let config = Self::load_from_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    fn finish(mut config: TranslatorConfig, source: Option<PathBuf>) -> TranslationResult<Self> {
        config.apply_env_overrides();
        config.validate()?;
        Ok(Self { config, source })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslatorConfig {
        self.config
    }

    /// 实际加载的配置文件
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 查找配置文件
    fn load_config() -> TranslationResult<(TranslatorConfig, Option<PathBuf>)> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                let config = Self::load_from_file(candidate)?;
                return Ok((config, Some(candidate.to_path_buf())));
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok((TranslatorConfig::default(), None))
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslatorConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            helpers::config_error(format!("读取配置文件失败: {}", e)).with_context(path.display())
        })?;

        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(|e| {
                helpers::config_error(format!("解析JSON配置失败: {}", e)).with_context(path.display())
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                helpers::config_error(format!("解析TOML配置失败: {}", e)).with_context(path.display())
            })
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let mut config = TranslatorConfig::default();
        config.paths = vec!["lang".to_string()];
        config.providers.insert(
            "openai".to_string(),
            ProviderSettings {
                model: Some(constants::OPENAI_MODEL.to_string()),
                ..ProviderSettings::default()
            },
        );
        config.providers.insert("deepl".to_string(), ProviderSettings::default());
        config.providers.insert("google".to_string(), ProviderSettings::default());

        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
