//! 翻译同步模块
//!
//! 检测各语言文件中缺失的键，通过可插拔的翻译服务补全并写回：
//! - **config**: 配置管理
//! - **core**: 执行器、管理器和运行统计
//! - **masking**: 占位符保护
//! - **pipeline**: 语言文件收集、扁平化和差异计算
//! - **providers**: 翻译服务适配器
//! - **queue**: 后台任务队列
//! - **storage**: 缓存、任务状态和运行报告
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use langsync::translation::{TranslateOptions, TranslationManager, TranslatorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = TranslationManager::new(TranslatorConfig::with_base_path("."))?;
//!
//! let missing = manager.count_missing("en", "tr", false)?;
//! let summary = manager
//!     .translate("en", "tr", None, &TranslateOptions::default())
//!     .await?;
//! assert_eq!(summary.totals.missing, missing);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 语言目录、服务凭据、缓存与队列设置
pub mod config;

/// 核心模块 - 回退链执行器与翻译管理器
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

pub mod masking;

/// 文本处理管道模块 - 文件收集、扁平化与差异计算
pub mod pipeline;

/// 翻译服务模块 - OpenAI、DeepSeek、DeepL、Google
pub mod providers;

/// 任务队列模块 - 执行槽、任务与工作协程
pub mod queue;

/// 存储管理模块 - 缓存和持久化存储
///
/// 提供翻译结果缓存、任务运行状态与运行报告
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{constants, ConfigManager, TranslatorConfig};
pub use core::{
    TranslateOptions, TranslationManager, TranslationOutput, TranslationPerformer,
    TranslationSummary,
};
pub use error::{
    ErrorCategory, ErrorSeverity, ProviderError, TranslationError, TranslationResult,
};
pub use providers::{ProviderRegistry, TranslationProvider};
pub use queue::TranslationQueue;
pub use storage::{QueueMonitor, ReportStore, StateStore, TranslationCache};
