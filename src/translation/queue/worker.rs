//! 任务队列与工作协程
//!
//! `dispatch` 先把任务记为 queued，再放进通道；工作协程从通道取任务执行。
//! 没拿到执行槽的任务在 `release_delay` 之后重新放回通道。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;

use super::job::{JobContext, JobOutcome, TranslationJob};
use super::slots::ConcurrencySlots;
use crate::translation::config::QueueSettings;
use crate::translation::core::TranslationManager;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::LocaleFile;
use crate::translation::storage::QueueMonitor;

struct Shared {
    sender: mpsc::UnboundedSender<TranslationJob>,
    receiver: Mutex<mpsc::UnboundedReceiver<TranslationJob>>,
    context: JobContext,
    /// 已入队但尚未结束的任务数
    outstanding: AtomicUsize,
    idle: Notify,
    release_delay: Duration,
}

/// 翻译任务队列
#[derive(Clone)]
pub struct TranslationQueue {
    shared: Arc<Shared>,
    workers: usize,
}

/// 运行中的工作协程
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl TranslationQueue {
    pub fn new(manager: Arc<TranslationManager>, monitor: QueueMonitor, settings: &QueueSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let context = JobContext {
            manager,
            monitor,
            slots: ConcurrencySlots::new(settings.max_concurrent, settings.slot_wait()),
            max_attempts: settings.max_attempts.max(1) as u32,
        };

        Self {
            shared: Arc::new(Shared {
                sender,
                receiver: Mutex::new(receiver),
                context,
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
                release_delay: settings.release_delay(),
            }),
            workers: settings.workers.max(1),
        }
    }

    pub fn monitor(&self) -> &QueueMonitor {
        &self.shared.context.monitor
    }

    pub fn slots(&self) -> &ConcurrencySlots {
        &self.shared.context.slots
    }

    /// 创建任务并入队，返回任务 ID
    pub fn dispatch(
        &self,
        from: &str,
        to: &str,
        file: LocaleFile,
        provider: Option<String>,
        force: bool,
    ) -> TranslationResult<String> {
        let job = TranslationJob::new(from, to, file, provider, force);
        let id = job.id.clone();

        self.shared.context.monitor.mark_queued(&id, job.describe())?;
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);

        if self.shared.sender.send(job).is_err() {
            finish_one(&self.shared);
            return Err(TranslationError::ConcurrencyError("任务队列已关闭".to_string()));
        }

        tracing::info!("任务 #{} 已入队: {} → {}", id, from, to);
        Ok(id)
    }

    /// 源语言的每个文件各入队一个任务
    pub fn dispatch_all(
        &self,
        from: &str,
        to: &str,
        provider: Option<String>,
        force: bool,
    ) -> TranslationResult<Vec<String>> {
        self.shared
            .context
            .manager
            .discover(from)?
            .into_iter()
            .map(|file| self.dispatch(from, to, file, provider.clone(), force))
            .collect()
    }

    /// 启动工作协程
    pub fn spawn_workers(&self) -> WorkerPool {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handles = (0..self.workers)
            .map(|index| {
                let shared = self.shared.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(run_worker(index, shared, shutdown_rx))
            })
            .collect();

        tracing::debug!("已启动 {} 个工作协程", self.workers);
        WorkerPool { handles, shutdown }
    }

    /// 等待所有已入队的任务结束
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }
}

impl WorkerPool {
    /// 通知工作协程退出并等待结束；正在执行的任务会先完成
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("工作协程异常退出: {}", e);
            }
        }
    }
}

fn finish_one(shared: &Shared) {
    if shared.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
        shared.idle.notify_waiters();
    }
}

async fn run_worker(index: usize, shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => None,
            job = async { shared.receiver.lock().await.recv().await } => job,
        };

        let Some(mut job) = next else {
            break;
        };

        match job.handle(&shared.context).await {
            JobOutcome::Released => {
                let shared = shared.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(shared.release_delay).await;
                    if shared.sender.send(job).is_err() {
                        finish_one(&shared);
                    }
                });
            }
            JobOutcome::Completed(_) | JobOutcome::Failed(_) => finish_one(&shared),
        }
    }

    tracing::debug!("工作协程 {} 已退出", index);
}
