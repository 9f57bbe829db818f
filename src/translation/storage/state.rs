//! 队列运行状态
//!
//! 每个任务一条记录，以任务 ID 为键存放在 redb 中。每次更新都在单个写事务里
//! 完成读取、合并和写回，多个工作协程并发更新时不会丢失数据。
//! 状态只能向前推进：queued → running → completed | failed。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::SharedDatabase;
use crate::translation::error::{helpers, TranslationError, TranslationResult};

const JOBS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("jobs");

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 允许的转换；同状态转换用于重新入队和进度更新
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Queued)
                | (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

/// 任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub file: String,
    pub from: String,
    pub to: String,
    pub provider: Option<String>,
    pub status: JobStatus,
    pub attempts: u32,
    pub missing: usize,
    pub translated: usize,
    pub progress_total: usize,
    pub last_key: Option<String>,
    pub duration_ms: Option<f64>,
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn new(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            file: String::new(),
            from: String::new(),
            to: String::new(),
            provider: None,
            status: JobStatus::Queued,
            attempts: 0,
            missing: 0,
            translated: 0,
            progress_total: 0,
            last_key: None,
            duration_ms: None,
            error: None,
            queued_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            updated_at: now,
        }
    }
}

/// 合并进任务记录的字段，`None` 表示保持原值
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub file: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub provider: Option<String>,
    pub attempts: Option<u32>,
    pub missing: Option<usize>,
    pub translated: Option<usize>,
    pub progress_total: Option<usize>,
    pub last_key: Option<String>,
    pub duration_ms: Option<f64>,
    pub error: Option<String>,
}

impl JobUpdate {
    fn apply(self, record: &mut JobRecord) {
        if let Some(file) = self.file {
            record.file = file;
        }
        if let Some(from) = self.from {
            record.from = from;
        }
        if let Some(to) = self.to {
            record.to = to;
        }
        if self.provider.is_some() {
            record.provider = self.provider;
        }
        if let Some(attempts) = self.attempts {
            record.attempts = attempts;
        }
        if let Some(missing) = self.missing {
            record.missing = missing;
        }
        if let Some(translated) = self.translated {
            record.translated = translated;
        }
        if let Some(total) = self.progress_total {
            record.progress_total = total;
        }
        if self.last_key.is_some() {
            record.last_key = self.last_key;
        }
        if self.duration_ms.is_some() {
            record.duration_ms = self.duration_ms;
        }
        if self.error.is_some() {
            record.error = self.error;
        }
    }
}

/// 汇总计数；pending 包含排队中和运行中的任务
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTotals {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

/// 对外暴露的完整状态文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub jobs: Vec<JobRecord>,
    pub totals: QueueTotals,
}

impl QueueState {
    fn from_jobs(mut jobs: Vec<JobRecord>) -> Self {
        jobs.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then_with(|| a.id.cmp(&b.id)));

        let mut totals = QueueTotals::default();
        for job in &jobs {
            match job.status {
                JobStatus::Queued | JobStatus::Running => totals.pending += 1,
                JobStatus::Completed => totals.completed += 1,
                JobStatus::Failed => totals.failed += 1,
            }
        }

        Self { jobs, totals }
    }
}

/// 队列状态监视器
#[derive(Clone, Debug)]
pub struct QueueMonitor {
    db: SharedDatabase,
    snapshot: Option<PathBuf>,
}

impl QueueMonitor {
    pub fn new(db: SharedDatabase) -> TranslationResult<Self> {
        db.with(|db| {
            let txn = db.begin_write().map_err(helpers::storage_error)?;
            txn.open_table(JOBS_TABLE).map_err(helpers::storage_error)?;
            txn.commit().map_err(helpers::storage_error)
        })?;
        Ok(Self { db, snapshot: None })
    }

    /// 每次状态变化后把状态文档写到 `path`
    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        self.snapshot = Some(path);
        self
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    pub fn mark_queued(&self, id: &str, update: JobUpdate) -> TranslationResult<JobRecord> {
        self.transition(id, JobStatus::Queued, update)
    }

    pub fn mark_running(&self, id: &str, update: JobUpdate) -> TranslationResult<JobRecord> {
        self.transition(id, JobStatus::Running, update)
    }

    /// 运行中的进度更新
    pub fn mark_progress(&self, id: &str, update: JobUpdate) -> TranslationResult<JobRecord> {
        self.transition(id, JobStatus::Running, update)
    }

    pub fn mark_finished(&self, id: &str, update: JobUpdate) -> TranslationResult<JobRecord> {
        self.transition(id, JobStatus::Completed, update)
    }

    pub fn mark_failed(&self, id: &str, error: &str) -> TranslationResult<JobRecord> {
        self.transition(
            id,
            JobStatus::Failed,
            JobUpdate {
                error: Some(error.to_string()),
                ..JobUpdate::default()
            },
        )
    }

    fn transition(
        &self,
        id: &str,
        status: JobStatus,
        update: JobUpdate,
    ) -> TranslationResult<JobRecord> {
        self.db.with(|db| {
            let record = apply_transition(db, id, status, update)?;
            if let Some(path) = &self.snapshot {
                if let Err(e) = read_state(db).and_then(|state| write_document(path, &state)) {
                    tracing::warn!("写入状态快照失败: {}", e);
                }
            }
            Ok(record)
        })
    }

    pub fn get(&self, id: &str) -> TranslationResult<Option<JobRecord>> {
        self.db.with(|db| {
            let txn = db.begin_read().map_err(helpers::storage_error)?;
            let table = txn.open_table(JOBS_TABLE).map_err(helpers::storage_error)?;
            let raw = table
                .get(id)
                .map_err(helpers::storage_error)?
                .map(|guard| guard.value().to_string());

            match raw {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        })
    }

    /// 当前全部任务及汇总
    pub fn state(&self) -> TranslationResult<QueueState> {
        self.db.with(read_state)
    }

    /// 把状态文档写成 JSON，供外部观察者读取
    pub fn export_json(&self, path: &Path) -> TranslationResult<()> {
        write_document(path, &self.state()?)
    }
}

fn apply_transition(
    db: &Database,
    id: &str,
    status: JobStatus,
    update: JobUpdate,
) -> TranslationResult<JobRecord> {
    let now = Utc::now();
    let txn = db.begin_write().map_err(helpers::storage_error)?;

    let outcome = {
        let mut table = txn.open_table(JOBS_TABLE).map_err(helpers::storage_error)?;
        let existing = table
            .get(id)
            .map_err(helpers::storage_error)?
            .map(|guard| guard.value().to_string());

        let mut record = match existing {
            Some(raw) => serde_json::from_str::<JobRecord>(&raw)?,
            None => JobRecord::new(id, now),
        };

        if record.status.can_advance_to(status) {
            update.apply(&mut record);
            if record.status != status {
                match status {
                    JobStatus::Running => record.started_at = Some(now),
                    JobStatus::Completed => {
                        record.completed_at = Some(now);
                        // 重试前记下的临时错误
                        record.error = None;
                    }
                    JobStatus::Failed => record.failed_at = Some(now),
                    JobStatus::Queued => {}
                }
            }
            record.status = status;
            record.updated_at = now;

            let raw = serde_json::to_string(&record)?;
            table
                .insert(id, raw.as_str())
                .map_err(helpers::storage_error)?;
            Ok(record)
        } else {
            Err(TranslationError::StateError(format!(
                "任务 {} 不能从 {:?} 转为 {:?}",
                id, record.status, status
            )))
        }
    };

    match outcome {
        Ok(record) => {
            txn.commit().map_err(helpers::storage_error)?;
            Ok(record)
        }
        Err(e) => {
            txn.abort().map_err(helpers::storage_error)?;
            Err(e)
        }
    }
}

fn read_state(db: &Database) -> TranslationResult<QueueState> {
    let txn = db.begin_read().map_err(helpers::storage_error)?;
    let table = txn.open_table(JOBS_TABLE).map_err(helpers::storage_error)?;

    let mut jobs = Vec::new();
    for item in table.iter().map_err(helpers::storage_error)? {
        let (_, value) = item.map_err(helpers::storage_error)?;
        jobs.push(serde_json::from_str::<JobRecord>(value.value())?);
    }

    Ok(QueueState::from_jobs(jobs))
}

fn write_document(path: &Path, state: &QueueState) -> TranslationResult<()> {
    let mut content = serde_json::to_string_pretty(state)?;
    content.push('\n');
    crate::translation::pipeline::collector::write_atomic(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> (tempfile::TempDir, QueueMonitor) {
        let dir = tempfile::tempdir().unwrap();
        let db = SharedDatabase::new(&dir.path().join("state.redb")).unwrap();
        (dir, QueueMonitor::new(db).unwrap())
    }

    fn describe(file: &str) -> JobUpdate {
        JobUpdate {
            file: Some(file.to_string()),
            from: Some("en".to_string()),
            to: Some("tr".to_string()),
            ..JobUpdate::default()
        }
    }

    #[test]
    fn test_lifecycle_and_totals() {
        let (_dir, monitor) = monitor();

        monitor.mark_queued("a", describe("messages.json")).unwrap();
        monitor.mark_queued("b", describe("auth.json")).unwrap();
        monitor.mark_running("a", JobUpdate::default()).unwrap();
        monitor
            .mark_progress(
                "a",
                JobUpdate {
                    last_key: Some("farewell".to_string()),
                    translated: Some(1),
                    ..JobUpdate::default()
                },
            )
            .unwrap();

        let state = monitor.state().unwrap();
        assert_eq!(state.totals, QueueTotals { pending: 2, completed: 0, failed: 0 });

        let finished = monitor
            .mark_finished(
                "a",
                JobUpdate {
                    missing: Some(1),
                    translated: Some(1),
                    duration_ms: Some(12.5),
                    ..JobUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.file, "messages.json");
        assert_eq!(finished.last_key.as_deref(), Some("farewell"));
        assert!(finished.started_at.is_some());
        assert!(finished.completed_at.is_some());

        monitor.mark_failed("b", "no slot").unwrap();

        let state = monitor.state().unwrap();
        assert_eq!(state.totals, QueueTotals { pending: 0, completed: 1, failed: 1 });
        assert_eq!(state.jobs.len(), 2);
    }

    #[test]
    fn test_backward_transition_rejected() {
        let (_dir, monitor) = monitor();
        monitor.mark_queued("job", describe("messages.json")).unwrap();
        monitor.mark_running("job", JobUpdate::default()).unwrap();
        monitor.mark_finished("job", JobUpdate::default()).unwrap();

        assert!(matches!(
            monitor.mark_running("job", JobUpdate::default()),
            Err(TranslationError::StateError(_))
        ));
        assert!(monitor.mark_queued("job", JobUpdate::default()).is_err());

        let record = monitor.get("job").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
    }

    #[test]
    fn test_export_json_document() {
        let (dir, monitor) = monitor();
        monitor.mark_queued("job", describe("messages.json")).unwrap();

        let path = dir.path().join("queue.json");
        monitor.export_json(&path).unwrap();

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["totals"]["pending"], 1);
        assert_eq!(exported["jobs"][0]["status"], "queued");
    }

    #[test]
    fn test_snapshot_follows_every_transition() {
        let (dir, monitor) = monitor();
        let path = dir.path().join("queue-state.json");
        let monitor = monitor.with_snapshot(path.clone());

        let read = || -> serde_json::Value {
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap()
        };

        monitor.mark_queued("job", describe("messages.json")).unwrap();
        assert_eq!(read()["jobs"][0]["status"], "queued");

        monitor.mark_running("job", JobUpdate::default()).unwrap();
        monitor.mark_finished("job", JobUpdate::default()).unwrap();
        let snapshot = read();
        assert_eq!(snapshot["jobs"][0]["status"], "completed");
        assert_eq!(snapshot["totals"]["completed"], 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let (_dir, monitor) = monitor();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    monitor
                        .mark_queued(&format!("job-{}", i), describe("messages.json"))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(monitor.state().unwrap().totals.pending, 8);
    }
}
