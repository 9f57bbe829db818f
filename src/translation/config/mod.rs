//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{
    CacheDriver, CacheSettings, ConfigManager, ProviderSettings, QueueSettings, TranslatorConfig,
};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 翻译服务
    pub const DEFAULT_PROVIDER: &str = "openai";
    pub const FALLBACK_PROVIDERS: &[&str] = &["openai", "deepl", "google"];
    pub const BUILTIN_PROVIDERS: &[&str] = &["openai", "deepseek", "deepl", "google"];
    pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
    pub const OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
    pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
    pub const DEEPL_API_BASE: &str = "https://api-free.deepl.com/v2";
    pub const GOOGLE_API_BASE: &str = "https://translation.googleapis.com/language/translate/v2";
    pub const CHAT_TEMPERATURE: f32 = 0.2;

    // 队列
    pub const DEFAULT_QUEUE_MAX_CONCURRENT: usize = 5;
    pub const DEFAULT_QUEUE_WORKERS: usize = 2;
    pub const DEFAULT_SLOT_WAIT: Duration = Duration::from_secs(3);
    pub const DEFAULT_RELEASE_DELAY: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

    // 存储
    pub const DEFAULT_STATE_DIR: &str = "storage/langsync";
    pub const STATE_DB_FILE: &str = "state.redb";
    pub const CACHE_DB_FILE: &str = "cache.redb";
    pub const STATE_SNAPSHOT_FILE: &str = "queue-state.json";
    /// 其他进程占用数据库文件时的最长等待
    pub const DATABASE_LOCK_WAIT: Duration = Duration::from_secs(10);
    pub const DATABASE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

    // 语言目录候选（相对于项目根目录）
    pub const LANGUAGE_ROOTS: &[&str] = &["lang", "resources/lang"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "langsync.toml",
        ".langsync.toml",
        "langsync.json",
        "~/.config/langsync/config.toml",
    ];

    // .env 文件，按优先级排列
    pub const ENV_FILES: &[&str] = &[".env.local", ".env"];
}
