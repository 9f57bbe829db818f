//! 运行统计
//!
//! 单个文件的统计在翻译过程中累积，结束时转成报告条目；
//! 管理器整个生命周期的计数使用原子操作，可随时取快照。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 单个文件的缺失与翻译数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub name: String,
    pub missing: usize,
    pub translated: usize,
}

/// 全部文件的合计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub missing: usize,
    pub translated: usize,
}

/// 报告中的缓存部分
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheReport {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

/// 报告中的单个文件条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub file: String,
    pub translated: usize,
    pub missing: usize,
    pub primary_provider: String,
    pub providers: BTreeMap<String, usize>,
    pub cache: CacheReport,
    pub duration_ms: f64,
    #[serde(default)]
    pub degraded: usize,
}

/// 翻译单个文件时累积的统计
#[derive(Debug, Clone, Default)]
pub struct FileRunStats {
    pub providers: BTreeMap<String, usize>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub degraded: usize,
    pub duration: Duration,
}

impl FileRunStats {
    pub fn record(&mut self, provider: &str, cache_hit: bool, degraded: bool, duration: Duration) {
        *self.providers.entry(provider.to_string()).or_insert(0) += 1;
        if cache_hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
        if degraded {
            self.degraded += 1;
        }
        self.duration += duration;
    }

    /// 使用次数最多的服务；并列时取名称靠前者，没有记录时为 "unknown"
    pub fn primary_provider(&self) -> String {
        self.providers
            .iter()
            .fold(None::<(&String, usize)>, |best, (name, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((name, count)),
            })
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn report_entry(&self, file: &str, translated: usize, missing: usize) -> ReportEntry {
        let lookups = self.cache_hits + self.cache_misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            round2(self.cache_hits as f64 / lookups as f64)
        };

        ReportEntry {
            file: file.to_string(),
            translated,
            missing,
            primary_provider: self.primary_provider(),
            providers: self.providers.clone(),
            cache: CacheReport {
                hits: self.cache_hits,
                misses: self.cache_misses,
                hit_rate,
            },
            duration_ms: round2(self.duration.as_secs_f64() * 1000.0),
            degraded: self.degraded,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 管理器生命周期内的统计
#[derive(Debug, Default)]
pub struct ServiceStats {
    /// 成功翻译的键数量
    pub keys_translated: AtomicUsize,

    /// 缓存命中次数
    pub cache_hits: AtomicUsize,

    /// 缓存未命中次数
    pub cache_misses: AtomicUsize,

    /// 单个服务调用失败次数
    pub provider_failures: AtomicUsize,

    /// 占位符丢失后退回原文的次数
    pub degraded_restores: AtomicUsize,
}

impl ServiceStats {
    pub fn inc_keys_translated(&self) {
        self.keys_translated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_provider_failures(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_degraded_restores(&self) {
        self.degraded_restores.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取统计数据的快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            keys_translated: self.keys_translated.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            degraded_restores: self.degraded_restores.load(Ordering::Relaxed),
        }
    }
}

/// 统计数据的不可变快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatsSnapshot {
    pub keys_translated: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub provider_failures: usize,
    pub degraded_restores: usize,
}
