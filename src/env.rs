//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量管理。翻译服务的凭据也从这里读取，
//! 再由配置层合并成按服务名称索引的配置表。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 只在变量被显式设置时返回值，解析失败同样视为未设置
    fn get_set() -> Option<T> {
        env::var(Self::NAME).ok().and_then(|v| Self::parse(&v).ok())
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LANGSYNC_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 日志文件
    pub struct LogFile;
    impl EnvVar<String> for LogFile {
        const NAME: &'static str = "LANGSYNC_LOG_FILE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Append logs to this file in addition to stderr";

        fn parse(value: &str) -> EnvResult<String> {
            non_empty(value, Self::NAME)
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 同步行为相关环境变量
pub mod translator {
    use super::*;

    /// 默认翻译服务
    pub struct Provider;
    impl EnvVar<String> for Provider {
        const NAME: &'static str = "LANGSYNC_PROVIDER";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("openai".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Default translation provider name";

        fn parse(value: &str) -> EnvResult<String> {
            non_empty(value, Self::NAME).map(|v| v.to_lowercase())
        }
    }

    /// 语言文件根目录（逗号分隔，支持通配符）
    pub struct Paths;
    impl EnvVar<Vec<String>> for Paths {
        const NAME: &'static str = "LANGSYNC_PATHS";
        const DEFAULT: Option<Vec<String>> = None;
        const DESCRIPTION: &'static str =
            "Language root directories (comma-separated, glob patterns allowed)";

        fn parse(value: &str) -> EnvResult<Vec<String>> {
            Ok(split_list(value))
        }
    }

    /// 项目根目录
    pub struct BasePath;
    impl EnvVar<String> for BasePath {
        const NAME: &'static str = "LANGSYNC_BASE_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Project base path used to locate lang/ directories";

        fn parse(value: &str) -> EnvResult<String> {
            non_empty(value, Self::NAME)
        }
    }

    /// 自动创建缺失的目标文件
    pub struct AutoCreate;
    impl EnvVar<bool> for AutoCreate {
        const NAME: &'static str = "LANGSYNC_AUTO_CREATE_MISSING_FILES";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Create empty target files when nothing was translated";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 运行状态和报告存储目录
    pub struct StateDir;
    impl EnvVar<String> for StateDir {
        const NAME: &'static str = "LANGSYNC_STATE_DIR";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Directory holding the run-state and report database";

        fn parse(value: &str) -> EnvResult<String> {
            non_empty(value, Self::NAME)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "LANGSYNC_CACHE_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the translation cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存后端
    pub struct Driver;
    impl EnvVar<String> for Driver {
        const NAME: &'static str = "LANGSYNC_CACHE_DRIVER";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("redb".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Cache backend: memory, redb";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "memory" | "redb" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid cache driver '{}'. Use: memory, redb", value),
                }),
            }
        }
    }

    /// 缓存文件路径
    pub struct Path;
    impl EnvVar<String> for Path {
        const NAME: &'static str = "LANGSYNC_CACHE_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "On-disk cache database file (redb driver)";

        fn parse(value: &str) -> EnvResult<String> {
            non_empty(value, Self::NAME)
        }
    }
}

/// 队列相关环境变量
pub mod queue {
    use super::*;

    /// 同时运行的文件翻译数量上限
    pub struct MaxConcurrent;
    impl EnvVar<usize> for MaxConcurrent {
        const NAME: &'static str = "LANGSYNC_QUEUE_MAX_CONCURRENT";
        const DEFAULT: Option<usize> = Some(5);
        const DESCRIPTION: &'static str = "Maximum file translations running at once";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }

    /// 工作协程数量
    pub struct Workers;
    impl EnvVar<usize> for Workers {
        const NAME: &'static str = "LANGSYNC_QUEUE_WORKERS";
        const DEFAULT: Option<usize> = Some(2);
        const DESCRIPTION: &'static str = "Number of queue workers";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }

    /// 获取执行槽位的最长等待时间
    pub struct SlotWait;
    impl EnvVar<Duration> for SlotWait {
        const NAME: &'static str = "LANGSYNC_QUEUE_SLOT_WAIT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(3));
        const DESCRIPTION: &'static str = "Seconds a job waits for a concurrency slot";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_seconds(value, Self::NAME, 60)
        }
    }

    /// 任务重新入队的延迟
    pub struct ReleaseDelay;
    impl EnvVar<Duration> for ReleaseDelay {
        const NAME: &'static str = "LANGSYNC_QUEUE_RELEASE_DELAY";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(5));
        const DESCRIPTION: &'static str = "Seconds before a job without a slot is requeued";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_seconds(value, Self::NAME, 300)
        }
    }

    /// 最大尝试次数
    pub struct MaxAttempts;
    impl EnvVar<usize> for MaxAttempts {
        const NAME: &'static str = "LANGSYNC_QUEUE_MAX_ATTEMPTS";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Attempts before a job waiting for a slot is failed";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100)
        }
    }
}

/// 翻译服务凭据
pub mod providers {
    use super::*;

    macro_rules! credential {
        ($(#[$doc:meta])* $ty:ident, $name:literal, $desc:literal) => {
            $(#[$doc])*
            pub struct $ty;
            impl EnvVar<String> for $ty {
                const NAME: &'static str = $name;
                const DEFAULT: Option<String> = None;
                const DESCRIPTION: &'static str = $desc;

                fn parse(value: &str) -> EnvResult<String> {
                    non_empty(value, Self::NAME)
                }
            }
        };
    }

    credential!(
        /// OpenAI 密钥
        OpenAiApiKey, "OPENAI_API_KEY", "OpenAI API key"
    );
    credential!(OpenAiModel, "OPENAI_MODEL", "OpenAI chat model (default: gpt-4o-mini)");
    credential!(OpenAiApiBase, "OPENAI_API_BASE", "OpenAI API base URL");
    credential!(
        /// DeepSeek 密钥
        DeepSeekApiKey, "DEEPSEEK_API_KEY", "DeepSeek API key"
    );
    credential!(DeepSeekModel, "DEEPSEEK_MODEL", "DeepSeek chat model (default: deepseek-chat)");
    credential!(DeepSeekApiBase, "DEEPSEEK_API_BASE", "DeepSeek API base URL");
    credential!(
        /// DeepL 密钥
        DeepLApiKey, "DEEPL_API_KEY", "DeepL authentication key"
    );
    credential!(DeepLApiBase, "DEEPL_API_BASE", "DeepL API base URL");
    credential!(
        /// Google Cloud Translation 密钥
        GoogleApiKey, "GOOGLE_TRANSLATE_API_KEY", "Google Cloud Translation API key"
    );
    credential!(GoogleApiBase, "GOOGLE_TRANSLATE_API_BASE", "Google Translation API base URL");

    /// 按服务类型查询凭据、模型和地址
    pub fn lookup(kind: &str) -> (Option<String>, Option<String>, Option<String>) {
        match kind {
            "openai" => (
                OpenAiApiKey::get_set(),
                OpenAiModel::get_set(),
                OpenAiApiBase::get_set(),
            ),
            "deepseek" => (
                DeepSeekApiKey::get_set(),
                DeepSeekModel::get_set(),
                DeepSeekApiBase::get_set(),
            ),
            "deepl" => (DeepLApiKey::get_set(), None, DeepLApiBase::get_set()),
            "google" => (GoogleApiKey::get_set(), None, GoogleApiBase::get_set()),
            _ => (None, None, None),
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_seconds(value: &str, var_name: &str, max: u64) -> EnvResult<Duration> {
    let seconds: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid number of seconds".to_string(),
    })?;

    if seconds > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {} seconds", seconds, max),
        });
    }

    Ok(Duration::from_secs(seconds))
}

fn non_empty(value: &str, var_name: &str) -> EnvResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Value must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub log_file: Option<String>,
    pub no_color: bool,

    pub provider: String,
    pub paths: Option<Vec<String>>,
    pub auto_create_missing_files: bool,

    pub cache_enabled: bool,
    pub cache_driver: String,

    pub queue_max_concurrent: usize,
    pub queue_workers: usize,
    pub queue_slot_wait: Duration,
    pub queue_release_delay: Duration,
    pub queue_max_attempts: usize,

    /// 已配置凭据的服务
    pub configured_providers: Vec<String>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        let configured_providers = ["openai", "deepseek", "deepl", "google"]
            .iter()
            .filter(|kind| providers::lookup(kind).0.is_some())
            .map(|kind| kind.to_string())
            .collect();

        Ok(Self {
            log_level: core::LogLevel::get()?,
            log_file: core::LogFile::get().ok(),
            no_color: core::NoColor::get()?,

            provider: translator::Provider::get()?,
            paths: translator::Paths::get().ok(),
            auto_create_missing_files: translator::AutoCreate::get()?,

            cache_enabled: cache::Enabled::get()?,
            cache_driver: cache::Driver::get()?,

            queue_max_concurrent: queue::MaxConcurrent::get()?,
            queue_workers: queue::Workers::get()?,
            queue_slot_wait: queue::SlotWait::get()?,
            queue_release_delay: queue::ReleaseDelay::get()?,
            queue_max_attempts: queue::MaxAttempts::get()?,

            configured_providers,
        })
    }

    /// 打印配置摘要（隐藏敏感信息）
    pub fn print_summary(&self) {
        println!("Environment Configuration Summary:");
        println!("  Log Level: {}", self.log_level);
        println!("  Provider: {}", self.provider);
        println!(
            "  Cache: {} ({})",
            if self.cache_enabled { "enabled" } else { "disabled" },
            self.cache_driver
        );
        println!("  Queue: {} concurrent, {} workers", self.queue_max_concurrent, self.queue_workers);
        for provider in &self.configured_providers {
            println!("  {} API Key: [configured]", provider);
        }
    }
}

fn doc_line<T: fmt::Debug>(docs: &mut String, name: &str, description: &str, default: Option<T>) {
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n", name, description, default));
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    doc_line(&mut docs, core::LogLevel::NAME, core::LogLevel::DESCRIPTION, core::LogLevel::DEFAULT);
    doc_line(&mut docs, core::LogFile::NAME, core::LogFile::DESCRIPTION, core::LogFile::DEFAULT);
    doc_line(&mut docs, core::NoColor::NAME, core::NoColor::DESCRIPTION, core::NoColor::DEFAULT);

    docs.push_str("\n## Sync Configuration\n\n");
    doc_line(
        &mut docs,
        translator::Provider::NAME,
        translator::Provider::DESCRIPTION,
        translator::Provider::DEFAULT,
    );
    doc_line(&mut docs, translator::Paths::NAME, translator::Paths::DESCRIPTION, translator::Paths::DEFAULT);
    doc_line(
        &mut docs,
        translator::BasePath::NAME,
        translator::BasePath::DESCRIPTION,
        translator::BasePath::DEFAULT,
    );
    doc_line(
        &mut docs,
        translator::AutoCreate::NAME,
        translator::AutoCreate::DESCRIPTION,
        translator::AutoCreate::DEFAULT,
    );
    doc_line(
        &mut docs,
        translator::StateDir::NAME,
        translator::StateDir::DESCRIPTION,
        translator::StateDir::DEFAULT,
    );

    docs.push_str("\n## Cache Configuration\n\n");
    doc_line(&mut docs, cache::Enabled::NAME, cache::Enabled::DESCRIPTION, cache::Enabled::DEFAULT);
    doc_line(&mut docs, cache::Driver::NAME, cache::Driver::DESCRIPTION, cache::Driver::DEFAULT);
    doc_line(&mut docs, cache::Path::NAME, cache::Path::DESCRIPTION, cache::Path::DEFAULT);

    docs.push_str("\n## Queue Configuration\n\n");
    doc_line(&mut docs, queue::MaxConcurrent::NAME, queue::MaxConcurrent::DESCRIPTION, queue::MaxConcurrent::DEFAULT);
    doc_line(&mut docs, queue::Workers::NAME, queue::Workers::DESCRIPTION, queue::Workers::DEFAULT);
    doc_line(&mut docs, queue::SlotWait::NAME, queue::SlotWait::DESCRIPTION, queue::SlotWait::DEFAULT);
    doc_line(&mut docs, queue::ReleaseDelay::NAME, queue::ReleaseDelay::DESCRIPTION, queue::ReleaseDelay::DEFAULT);
    doc_line(&mut docs, queue::MaxAttempts::NAME, queue::MaxAttempts::DESCRIPTION, queue::MaxAttempts::DEFAULT);

    docs.push_str("\n## Provider Credentials\n\n");
    doc_line(&mut docs, providers::OpenAiApiKey::NAME, providers::OpenAiApiKey::DESCRIPTION, providers::OpenAiApiKey::DEFAULT);
    doc_line(&mut docs, providers::OpenAiModel::NAME, providers::OpenAiModel::DESCRIPTION, providers::OpenAiModel::DEFAULT);
    doc_line(&mut docs, providers::OpenAiApiBase::NAME, providers::OpenAiApiBase::DESCRIPTION, providers::OpenAiApiBase::DEFAULT);
    doc_line(&mut docs, providers::DeepSeekApiKey::NAME, providers::DeepSeekApiKey::DESCRIPTION, providers::DeepSeekApiKey::DEFAULT);
    doc_line(&mut docs, providers::DeepSeekModel::NAME, providers::DeepSeekModel::DESCRIPTION, providers::DeepSeekModel::DEFAULT);
    doc_line(&mut docs, providers::DeepSeekApiBase::NAME, providers::DeepSeekApiBase::DESCRIPTION, providers::DeepSeekApiBase::DEFAULT);
    doc_line(&mut docs, providers::DeepLApiKey::NAME, providers::DeepLApiKey::DESCRIPTION, providers::DeepLApiKey::DEFAULT);
    doc_line(&mut docs, providers::DeepLApiBase::NAME, providers::DeepLApiBase::DESCRIPTION, providers::DeepLApiBase::DEFAULT);
    doc_line(&mut docs, providers::GoogleApiKey::NAME, providers::GoogleApiKey::DESCRIPTION, providers::GoogleApiKey::DEFAULT);
    doc_line(&mut docs, providers::GoogleApiBase::NAME, providers::GoogleApiBase::DESCRIPTION, providers::GoogleApiBase::DEFAULT);

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse("warn").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_boolean_parsing() {
        // 测试各种布尔值格式
        assert!(cache::Enabled::parse("true").unwrap());
        assert!(cache::Enabled::parse("1").unwrap());
        assert!(cache::Enabled::parse("YES").unwrap());
        assert!(!translator::AutoCreate::parse("off").unwrap());
        assert!(!translator::AutoCreate::parse("disabled").unwrap());

        // 测试无效值
        assert!(cache::Enabled::parse("maybe").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(queue::MaxConcurrent::parse("5").unwrap(), 5);
        assert!(queue::MaxConcurrent::parse("0").is_err());
        assert!(queue::MaxConcurrent::parse("1000").is_err());
        assert_eq!(queue::SlotWait::parse("3").unwrap(), Duration::from_secs(3));
        assert!(queue::ReleaseDelay::parse("soon").is_err());
    }

    #[test]
    fn test_list_and_driver_parsing() {
        assert_eq!(
            translator::Paths::parse("lang, modules/*/lang ,,").unwrap(),
            vec!["lang".to_string(), "modules/*/lang".to_string()]
        );
        assert_eq!(cache::Driver::parse("Memory").unwrap(), "memory");
        assert!(cache::Driver::parse("redis").is_err());
        assert!(providers::DeepLApiKey::parse("   ").is_err());
    }

    #[test]
    fn test_env_docs_cover_credentials() {
        let docs = generate_env_docs();
        assert!(docs.contains("OPENAI_API_KEY"));
        assert!(docs.contains("GOOGLE_TRANSLATE_API_KEY"));
        assert!(docs.contains("LANGSYNC_QUEUE_MAX_CONCURRENT"));
    }
}
