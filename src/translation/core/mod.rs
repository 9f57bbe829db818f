//! 翻译系统核心模块
//!
//! - **执行器** (`performer.rs`): 屏蔽占位符，按回退顺序依次查缓存、调用服务
//! - **管理器** (`manager.rs`): 遍历语言文件，比较差异，驱动执行器并写回结果
//! - **统计** (`stats.rs`): 文件级统计、报告条目和生命周期计数
//!
//! ## 使用示例
//!
//! ```no_run
//! use langsync::translation::config::TranslatorConfig;
//! use langsync::translation::core::{TranslateOptions, TranslationManager};
//!
//! # async fn run() -> langsync::translation::TranslationResult<()> {
//! let manager = TranslationManager::new(TranslatorConfig::with_base_path("."))?;
//! let summary = manager
//!     .translate("en", "tr", None, &TranslateOptions::default())
//!     .await?;
//! println!("已翻译 {} 个键", summary.totals.translated);
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod performer;
pub mod stats;

pub use manager::{
    FileInspection, FileTranslation, ManagerStats, ProgressFn, ProviderCheck, ReviewItem,
    TextTranslation, TranslateOptions, TranslationManager, TranslationSummary,
};
pub use performer::{TranslationOutput, TranslationPerformer, TranslationRequest};
pub use stats::{FileRunStats, FileStats, ReportEntry, ServiceStats, ServiceStatsSnapshot, Totals};
