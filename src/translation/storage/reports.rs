//! 翻译运行报告
//!
//! 只追加的运行历史，每次同步或队列任务完成后写入一条。

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::SharedDatabase;
use crate::translation::core::stats::ReportEntry;
use crate::translation::error::{helpers, TranslationResult};

const REPORTS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("reports");

/// 一次运行的报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub from: String,
    pub to: String,
    pub provider: Option<String>,
    pub executed_at: DateTime<Utc>,
    /// 触发方式，例如 "sync" 或任务 ID
    pub context: Option<String>,
    pub files: Vec<ReportEntry>,
}

/// 报告存储
#[derive(Clone, Debug)]
pub struct ReportStore {
    db: SharedDatabase,
}

impl ReportStore {
    pub fn new(db: SharedDatabase) -> TranslationResult<Self> {
        db.with(|db| {
            let txn = db.begin_write().map_err(helpers::storage_error)?;
            txn.open_table(REPORTS_TABLE).map_err(helpers::storage_error)?;
            txn.commit().map_err(helpers::storage_error)
        })?;
        Ok(Self { db })
    }

    /// 追加一次运行报告
    pub fn append_translation_run(
        &self,
        from: &str,
        to: &str,
        provider: Option<&str>,
        files: Vec<ReportEntry>,
        context: Option<&str>,
    ) -> TranslationResult<RunReport> {
        let report = RunReport {
            from: from.to_string(),
            to: to.to_string(),
            provider: provider.map(str::to_string),
            executed_at: Utc::now(),
            context: context.map(str::to_string),
            files,
        };
        let raw = serde_json::to_string(&report)?;

        self.db.with(|db| {
            let txn = db.begin_write().map_err(helpers::storage_error)?;
            {
                let mut table = txn.open_table(REPORTS_TABLE).map_err(helpers::storage_error)?;
                let next = table
                    .last()
                    .map_err(helpers::storage_error)?
                    .map(|(key, _)| key.value() + 1)
                    .unwrap_or(0);
                table
                    .insert(next, raw.as_str())
                    .map_err(helpers::storage_error)?;
            }
            txn.commit().map_err(helpers::storage_error)
        })?;

        tracing::debug!("已记录运行报告: {} → {} ({} 个文件)", from, to, report.files.len());
        Ok(report)
    }

    /// 按写入顺序返回全部报告
    pub fn all(&self) -> TranslationResult<Vec<RunReport>> {
        self.db.with(|db| {
            let txn = db.begin_read().map_err(helpers::storage_error)?;
            let table = txn.open_table(REPORTS_TABLE).map_err(helpers::storage_error)?;

            let mut reports = Vec::new();
            for item in table.iter().map_err(helpers::storage_error)? {
                let (_, value) = item.map_err(helpers::storage_error)?;
                reports.push(serde_json::from_str::<RunReport>(value.value())?);
            }
            Ok(reports)
        })
    }

    /// 最近的若干条报告，最新的在前
    pub fn latest(&self, limit: usize) -> TranslationResult<Vec<RunReport>> {
        let mut reports = self.all()?;
        reports.reverse();
        reports.truncate(limit);
        Ok(reports)
    }

    /// 导出为 JSON 数组
    pub fn export_json(&self, path: &Path) -> TranslationResult<()> {
        let mut content = serde_json::to_string_pretty(&self.all()?)?;
        content.push('\n');
        crate::translation::pipeline::collector::write_atomic(path, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::stats::FileRunStats;

    #[test]
    fn test_append_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(SharedDatabase::new(&dir.path().join("state.redb")).unwrap()).unwrap();

        let entry = FileRunStats::default().report_entry("lang/tr.json", 0, 0);
        store
            .append_translation_run("en", "tr", Some("openai"), vec![entry.clone()], Some("sync"))
            .unwrap();
        store
            .append_translation_run("en", "de", None, vec![entry], None)
            .unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].to, "tr");
        assert_eq!(all[0].provider.as_deref(), Some("openai"));
        assert_eq!(all[1].to, "de");

        let latest = store.latest(1).unwrap();
        assert_eq!(latest[0].to, "de");

        let path = dir.path().join("reports.json");
        store.export_json(&path).unwrap();
        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported.as_array().unwrap().len(), 2);
        assert_eq!(exported[0]["files"][0]["primary_provider"], "unknown");
    }
}
