//! 文件翻译任务
//!
//! 一个任务对应一个语言文件。执行前先获取执行槽，拿不到就延后重试。
//! 翻译时遇到网络或限流这类临时错误也会延后重试，其他错误直接记为 failed。
//! 两种重试合计不超过 `max_attempts` 次。

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::slots::ConcurrencySlots;
use crate::translation::core::{FileStats, TranslateOptions, TranslationManager};
use crate::translation::error::{helpers, TranslationError};
use crate::translation::pipeline::LocaleFile;
use crate::translation::storage::{JobUpdate, QueueMonitor};

/// 任务执行所需的共享资源
#[derive(Debug, Clone)]
pub struct JobContext {
    pub manager: Arc<TranslationManager>,
    pub monitor: QueueMonitor,
    pub slots: ConcurrencySlots,
    /// 最大尝试次数
    pub max_attempts: u32,
}

/// 任务执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(FileStats),
    /// 没拿到执行槽，稍后重新入队
    Released,
    Failed(String),
}

/// 文件翻译任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    pub id: String,
    pub from: String,
    pub to: String,
    pub file: LocaleFile,
    pub provider: Option<String>,
    pub force: bool,
    pub attempts: u32,
}

impl TranslationJob {
    pub fn new(from: &str, to: &str, file: LocaleFile, provider: Option<String>, force: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            file,
            provider,
            force,
            attempts: 0,
        }
    }

    /// 目标文件名
    pub fn file_name(&self) -> String {
        self.file.name_for(&self.to)
    }

    /// 入队时写入的任务描述
    pub fn describe(&self) -> JobUpdate {
        JobUpdate {
            file: Some(self.file_name()),
            from: Some(self.from.clone()),
            to: Some(self.to.clone()),
            provider: self.provider.clone(),
            attempts: Some(self.attempts),
            ..JobUpdate::default()
        }
    }

    pub async fn handle(&mut self, ctx: &JobContext) -> JobOutcome {
        self.attempts += 1;

        let guard = match ctx.slots.acquire().await {
            Ok(Some(guard)) => guard,
            Ok(None) if self.attempts >= ctx.max_attempts => {
                return self.fail(
                    ctx,
                    TranslationError::ConcurrencyError(format!(
                        "等待执行槽超时，已尝试 {} 次",
                        self.attempts
                    )),
                );
            }
            Ok(None) => {
                tracing::info!("任务 #{} 因并发限制延后执行", self.id);
                if let Err(e) = ctx.monitor.mark_queued(&self.id, self.describe()) {
                    tracing::warn!("更新任务状态失败: {}", e);
                }
                return JobOutcome::Released;
            }
            Err(e) => return self.fail(ctx, e),
        };

        let running_provider = self
            .provider
            .clone()
            .or_else(|| ctx.manager.available_providers().into_iter().next());

        if let Err(e) = ctx.monitor.mark_running(
            &self.id,
            JobUpdate {
                provider: running_provider.clone(),
                ..self.describe()
            },
        ) {
            tracing::warn!("更新任务状态失败: {}", e);
        }

        tracing::info!(
            "任务 #{} 开始: {} ({} → {})",
            self.id,
            self.file_name(),
            self.from,
            self.to
        );
        let start = Instant::now();

        let monitor = &ctx.monitor;
        let id = self.id.as_str();
        let mut processed = 0;
        let mut progress = |_: &str, key: &str, _: &str| {
            processed += 1;
            let update = JobUpdate {
                last_key: Some(key.to_string()),
                translated: Some(processed),
                ..JobUpdate::default()
            };
            if let Err(e) = monitor.mark_progress(id, update) {
                tracing::warn!("更新任务进度失败: {}", e);
            }
        };

        let options = TranslateOptions {
            force: self.force,
            provider: self.provider.clone(),
            ..TranslateOptions::default()
        };
        let result = ctx
            .manager
            .translate_file(&self.file, &self.from, &self.to, Some(&mut progress), &options)
            .await;
        drop(guard);

        let done = match result {
            Ok(done) => done,
            Err(e) if e.is_retryable() && self.attempts < ctx.max_attempts => {
                tracing::warn!("任务 #{} 遇到临时错误，稍后重试: {}", self.id, e);
                let update = JobUpdate {
                    error: Some(e.to_string()),
                    ..self.describe()
                };
                if let Err(err) = ctx.monitor.mark_progress(&self.id, update) {
                    tracing::warn!("更新任务状态失败: {}", err);
                }
                return JobOutcome::Released;
            }
            Err(e) => return self.fail(ctx, e),
        };

        let duration_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
        let provider = self
            .provider
            .clone()
            .or_else(|| {
                (done.report.primary_provider != "unknown")
                    .then(|| done.report.primary_provider.clone())
            })
            .or(running_provider);

        let update = JobUpdate {
            provider: provider.clone(),
            missing: Some(done.file.missing),
            translated: Some(done.file.translated),
            progress_total: Some(done.file.missing.max(done.file.translated)),
            duration_ms: Some(duration_ms),
            ..self.describe()
        };
        if let Err(e) = ctx.monitor.mark_finished(&self.id, update) {
            tracing::warn!("更新任务状态失败: {}", e);
        }

        if let Err(e) = ctx.manager.append_report(
            &self.from,
            &self.to,
            provider.as_deref(),
            vec![done.report],
            Some(&self.id),
        ) {
            tracing::warn!("写入运行报告失败: {}", e);
        }

        tracing::info!(
            "任务 #{} 完成: translated={} missing={} duration_ms={:.2}",
            self.id,
            done.file.translated,
            done.file.missing,
            duration_ms
        );
        JobOutcome::Completed(done.file)
    }

    fn fail(&self, ctx: &JobContext, error: TranslationError) -> JobOutcome {
        helpers::log_error(&error);
        let message = error.to_string();
        tracing::error!("任务 #{} 失败", self.id);
        if let Err(e) = ctx.monitor.mark_failed(&self.id, &message) {
            tracing::warn!("更新任务状态失败: {}", e);
        }
        JobOutcome::Failed(message)
    }
}
