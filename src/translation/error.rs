//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

use crate::translation::core::stats::FileStats;

/// 单个翻译服务的失败
///
/// 每个变体都带有服务名称，回退链可以统一记录和汇总，无需区分具体服务。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// 缺少凭据
    #[error("{provider}: 缺少 API 密钥")]
    MissingCredentials { provider: String },

    /// 传输层失败（连接、超时等）
    #[error("{provider}: 请求失败: {message}")]
    Transport { provider: String, message: String },

    /// 非 2xx 响应
    #[error("{provider}: HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// 响应中缺少译文字段
    #[error("{provider}: 响应格式无效: {message}")]
    MalformedResponse { provider: String, message: String },
}

impl ProviderError {
    /// 出错的服务名称
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::MissingCredentials { provider }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::MalformedResponse { provider, .. } => provider,
        }
    }

    pub fn missing_credentials(provider: &str) -> Self {
        ProviderError::MissingCredentials {
            provider: provider.to_string(),
        }
    }

    pub fn transport<T: fmt::Display>(provider: &str, message: T) -> Self {
        ProviderError::Transport {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    pub fn malformed<T: fmt::Display>(provider: &str, message: T) -> Self {
        ProviderError::MalformedResponse {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 单个翻译服务失败
    #[error("翻译服务错误: {0}")]
    Provider(#[from] ProviderError),

    /// 回退链上所有服务均失败
    #[error("所有翻译服务均失败: {}", join_failures(.failures))]
    ExhaustedProviders { failures: Vec<ProviderError> },

    /// 没有任何已注册的翻译服务
    #[error("没有可用的翻译服务")]
    NoProviders,

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 语言文件中不存在的键
    #[error("键不存在: {file} 中没有 {key}")]
    KeyNotFound { file: String, key: String },

    /// 文件系统错误
    #[error("文件系统错误: {0}")]
    FileSystemError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 持久化存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 任务状态非法转换
    #[error("任务状态错误: {0}")]
    StateError(String),

    /// 并发错误
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),

    /// 某个键翻译失败导致整次运行中止
    #[error("{file} 中的键 {key} 翻译失败: {source}")]
    KeyFailed {
        file: String,
        key: String,
        completed: Vec<FileStats>,
        source: Box<TranslationError>,
    },

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

fn join_failures(failures: &[ProviderError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Provider(ProviderError::Transport { .. }) => true,
            TranslationError::Provider(ProviderError::Http { status, .. }) => {
                *status == 429 || *status >= 500
            }
            TranslationError::Provider(_) => false,
            TranslationError::ExhaustedProviders { failures } => failures
                .iter()
                .any(|f| matches!(f, ProviderError::Transport { .. } | ProviderError::Http { .. })),
            TranslationError::ConcurrencyError(_) => true,
            TranslationError::StorageError(_) => true,
            TranslationError::CacheError(_) => true,
            TranslationError::KeyFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::Provider(_) => ErrorSeverity::Warning,
            TranslationError::ExhaustedProviders { .. } => ErrorSeverity::Error,
            TranslationError::NoProviders => ErrorSeverity::Critical,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::KeyNotFound { .. } => ErrorSeverity::Info,
            TranslationError::FileSystemError(_) => ErrorSeverity::Error,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::StorageError(_) => ErrorSeverity::Error,
            TranslationError::StateError(_) => ErrorSeverity::Warning,
            TranslationError::ConcurrencyError(_) => ErrorSeverity::Warning,
            TranslationError::KeyFailed { source, .. } => source.severity(),
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::Provider(ProviderError::MissingCredentials { .. }) => {
                ErrorCategory::Configuration
            }
            TranslationError::Provider(ProviderError::Transport { .. }) => ErrorCategory::Network,
            TranslationError::Provider(_) => ErrorCategory::Service,
            TranslationError::ExhaustedProviders { .. } => ErrorCategory::Service,
            TranslationError::NoProviders => ErrorCategory::Configuration,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::KeyNotFound { .. } => ErrorCategory::Input,
            TranslationError::FileSystemError(_) => ErrorCategory::FileSystem,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::StateError(_) => ErrorCategory::Concurrency,
            TranslationError::ConcurrencyError(_) => ErrorCategory::Concurrency,
            TranslationError::KeyFailed { source, .. } => source.category(),
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let new_msg = format!("{} (上下文: {})", self, context);

        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::InvalidInput(ref mut msg)
            | TranslationError::FileSystemError(ref mut msg)
            | TranslationError::ParseError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::CacheError(ref mut msg)
            | TranslationError::StorageError(ref mut msg)
            | TranslationError::StateError(ref mut msg)
            | TranslationError::ConcurrencyError(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => *msg = new_msg,
            // 结构化错误保持原样
            _ => {}
        }

        self
    }

    /// 如果是整次运行中止，返回中止前已完成的文件统计
    pub fn completed_files(&self) -> &[FileStats] {
        match self {
            TranslationError::KeyFailed { completed, .. } => completed,
            _ => &[],
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Input,
    Cache,
    Service,
    FileSystem,
    Parsing,
    Serialization,
    Storage,
    Concurrency,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::FileSystemError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::SerializationError(format!("TOML序列化错误: {}", error))
    }
}

impl From<redb::Error> for TranslationError {
    fn from(error: redb::Error) -> Self {
        TranslationError::StorageError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        let category = error.category();
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息 [{:?}]: {}", category, error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告 [{:?}]: {}", category, error),
            ErrorSeverity::Error => tracing::error!("翻译错误 [{:?}]: {}", category, error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误 [{:?}]: {}", category, error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建缓存错误
    pub fn cache_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::CacheError(msg.to_string())
    }

    /// 创建存储错误，redb 的各类错误都经由这里转换
    pub fn storage_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StorageError(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建文件系统错误，附带路径
    pub fn fs_error<P: fmt::Debug, E: fmt::Display>(path: P, error: E) -> TranslationError {
        TranslationError::FileSystemError(format!("{:?}: {}", path, error))
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}
