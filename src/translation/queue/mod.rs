//! 后台任务队列
//!
//! 把单个文件的翻译包装成可调度的任务。执行槽限制同时运行的任务数，
//! 任务状态写入 [`QueueMonitor`](crate::translation::storage::QueueMonitor)，
//! 供外部观察。

pub mod job;
pub mod slots;
pub mod worker;

pub use job::{JobContext, JobOutcome, TranslationJob};
pub use slots::{ConcurrencySlots, SlotGuard};
pub use worker::{TranslationQueue, WorkerPool};
