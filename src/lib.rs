//! # langsync
//!
//! 保持多语言文件同步的工具库：找出目标语言缺失的键，
//! 通过可插拔的 AI 翻译服务补全后写回语言文件。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译同步核心（配置、占位符保护、服务适配、管理器、任务队列）
//! - `env` - 类型安全的环境变量
//! - `logging` - 日志初始化

pub mod env;
pub mod logging;
pub mod translation;

pub use translation::{
    TranslateOptions, TranslationError, TranslationManager, TranslationResult, TranslatorConfig,
};
