//! 日志初始化
//!
//! 终端输出一路 fmt 日志；配置了日志文件时再追加一路不带颜色的输出。

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::env::{self, EnvVar};
use crate::translation::error::{helpers, TranslationResult};

/// 初始化全局日志
///
/// 级别优先取 `RUST_LOG`，其次是传入的 `level`，最后是 `LANGSYNC_LOG_LEVEL`。
/// 重复初始化返回错误，不会覆盖已有的订阅者。
pub fn init_logging(level: Option<&str>, log_file: Option<&Path>) -> TranslationResult<()> {
    let level = level
        .map(str::to_string)
        .unwrap_or_else(|| env::core::LogLevel::get_or_default("info".to_string()));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| helpers::fs_error(parent, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| helpers::fs_error(path, e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!env::core::NoColor::get_or_default(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| helpers::internal_error(format!("日志初始化失败: {}", e)))
}
