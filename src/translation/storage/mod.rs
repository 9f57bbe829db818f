//! 存储管理模块
//!
//! - `cache`: 翻译结果缓存（内存或 redb）
//! - `state`: 队列任务运行状态
//! - `reports`: 运行报告历史
//!
//! 运行状态和报告共用同一个 redb 数据库文件。

pub mod cache;
pub mod reports;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use redb::{Database, DatabaseError};

pub use cache::{CachedTranslation, CacheStats, TranslationCache};
pub use reports::{ReportStore, RunReport};
pub use state::{JobRecord, JobStatus, JobUpdate, QueueMonitor, QueueState, QueueTotals};

use crate::translation::config::constants;
use crate::translation::error::{helpers, TranslationResult};

/// 按需打开的 redb 数据库
///
/// redb 打开文件时持有独占锁。每次操作单独打开、用完即关，
/// 其他进程（状态查询、其他工作进程）可以在两次操作之间访问同一个文件。
/// 文件被占用时按固定间隔重试，超过等待时间才报错。
#[derive(Clone)]
pub struct SharedDatabase {
    path: Arc<PathBuf>,
    local: Arc<Mutex<()>>,
    lock_wait: Duration,
}

impl std::fmt::Debug for SharedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDatabase").field("path", &self.path).finish_non_exhaustive()
    }
}

impl SharedDatabase {
    pub fn new(path: &Path) -> TranslationResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| helpers::fs_error(parent, e))?;
        }
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            local: Arc::new(Mutex::new(())),
            lock_wait: constants::DATABASE_LOCK_WAIT,
        })
    }

    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 打开数据库执行一次操作，结束后立即关闭
    pub fn with<T>(&self, op: impl FnOnce(&Database) -> TranslationResult<T>) -> TranslationResult<T> {
        let _guard = self
            .local
            .lock()
            .map_err(|_| helpers::internal_error("数据库锁已损坏"))?;
        let db = self.acquire()?;
        op(&db)
    }

    fn acquire(&self) -> TranslationResult<Database> {
        let deadline = Instant::now() + self.lock_wait;
        loop {
            match Database::create(self.path.as_path()) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                    std::thread::sleep(constants::DATABASE_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(helpers::storage_error(format!("{}: {}", self.path.display(), e)));
                }
            }
        }
    }
}

/// 状态目录下的运行状态与报告存储
#[derive(Clone, Debug)]
pub struct StateStore {
    pub monitor: QueueMonitor,
    pub reports: ReportStore,
}

impl StateStore {
    /// 任务状态变化时同时写出 JSON 快照，外部观察者读快照即可，不必访问数据库
    pub fn open(state_dir: &Path) -> TranslationResult<Self> {
        let db = SharedDatabase::new(&state_dir.join(constants::STATE_DB_FILE))?;
        Ok(Self {
            monitor: QueueMonitor::new(db.clone())?
                .with_snapshot(state_dir.join(constants::STATE_SNAPSHOT_FILE)),
            reports: ReportStore::new(db)?,
        })
    }
}
