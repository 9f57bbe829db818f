//! 翻译缓存模块
//!
//! 以 (服务, 源语言, 目标语言, 屏蔽后文本) 的 blake3 摘要为键，缓存成功的翻译结果。
//! 条目永不过期，只能通过 `clear` 或 `forget` 清除。缓存禁用时所有操作都是空操作。

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use redb::{ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

use super::SharedDatabase;
use crate::translation::config::{CacheDriver, CacheSettings};
use crate::translation::error::{helpers, TranslationResult};

const CACHE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("translations");

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTranslation {
    pub translation: String,
    pub provider: String,
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn total_requests(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }

    /// 命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests() == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests() as f64
        }
    }
}

/// 缓存存储后端
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> TranslationResult<Option<CachedTranslation>>;
    fn put(&self, key: &str, value: &CachedTranslation) -> TranslationResult<()>;
    fn remove(&self, key: &str) -> TranslationResult<()>;
    fn clear(&self) -> TranslationResult<()>;
    fn len(&self) -> TranslationResult<usize>;
}

// ============================================================================
// 内存后端
// ============================================================================

/// 进程内缓存
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, CachedTranslation>,
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> TranslationResult<Option<CachedTranslation>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: &CachedTranslation) -> TranslationResult<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> TranslationResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> TranslationResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> TranslationResult<usize> {
        Ok(self.entries.len())
    }
}

// ============================================================================
// redb 后端
// ============================================================================

/// 磁盘缓存，跨进程运行保留
///
/// 每次读写单独打开数据库文件，多个进程可以共用同一份缓存。
#[derive(Debug)]
pub struct RedbStore {
    db: SharedDatabase,
}

impl RedbStore {
    pub fn open(path: &Path) -> TranslationResult<Self> {
        let db = SharedDatabase::new(path)?;
        db.with(|db| {
            let txn = db.begin_write().map_err(helpers::cache_error)?;
            txn.open_table(CACHE_TABLE).map_err(helpers::cache_error)?;
            txn.commit().map_err(helpers::cache_error)
        })?;

        tracing::debug!("打开缓存数据库: {}", path.display());
        Ok(Self { db })
    }
}

impl CacheStore for RedbStore {
    fn get(&self, key: &str) -> TranslationResult<Option<CachedTranslation>> {
        let raw = self.db.with(|db| {
            let txn = db.begin_read().map_err(helpers::cache_error)?;
            let table = txn.open_table(CACHE_TABLE).map_err(helpers::cache_error)?;
            let raw = table
                .get(key)
                .map_err(helpers::cache_error)?
                .map(|guard| guard.value().to_string());
            Ok(raw)
        })?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &CachedTranslation) -> TranslationResult<()> {
        let raw = serde_json::to_string(value)?;
        self.db.with(|db| {
            let txn = db.begin_write().map_err(helpers::cache_error)?;
            {
                let mut table = txn.open_table(CACHE_TABLE).map_err(helpers::cache_error)?;
                table.insert(key, raw.as_str()).map_err(helpers::cache_error)?;
            }
            txn.commit().map_err(helpers::cache_error)
        })
    }

    fn remove(&self, key: &str) -> TranslationResult<()> {
        self.db.with(|db| {
            let txn = db.begin_write().map_err(helpers::cache_error)?;
            {
                let mut table = txn.open_table(CACHE_TABLE).map_err(helpers::cache_error)?;
                table.remove(key).map_err(helpers::cache_error)?;
            }
            txn.commit().map_err(helpers::cache_error)
        })
    }

    fn clear(&self) -> TranslationResult<()> {
        self.db.with(|db| {
            let txn = db.begin_write().map_err(helpers::cache_error)?;
            txn.delete_table(CACHE_TABLE).map_err(helpers::cache_error)?;
            txn.open_table(CACHE_TABLE).map_err(helpers::cache_error)?;
            txn.commit().map_err(helpers::cache_error)
        })
    }

    fn len(&self) -> TranslationResult<usize> {
        self.db.with(|db| {
            let txn = db.begin_read().map_err(helpers::cache_error)?;
            let table = txn.open_table(CACHE_TABLE).map_err(helpers::cache_error)?;
            let len = table.len().map_err(helpers::cache_error)?;
            Ok(len as usize)
        })
    }
}

// ============================================================================
// 翻译缓存
// ============================================================================

/// 翻译缓存
#[derive(Clone)]
pub struct TranslationCache {
    enabled: bool,
    store: Arc<dyn CacheStore>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            enabled: true,
            store,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 进程内缓存
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// 禁用的缓存，所有操作均为空操作
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::memory()
        }
    }

    /// 按配置创建缓存
    pub fn from_settings(settings: &CacheSettings, path: &Path) -> TranslationResult<Self> {
        if !settings.enabled {
            return Ok(Self::disabled());
        }

        match settings.driver {
            CacheDriver::Memory => Ok(Self::memory()),
            CacheDriver::Redb => Ok(Self::new(Arc::new(RedbStore::open(path)?))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 缓存键：四元组的 blake3 摘要
    pub fn key(provider: &str, from: &str, to: &str, text: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(provider.as_bytes());
        hasher.update(b"|");
        hasher.update(from.as_bytes());
        hasher.update(b"|");
        hasher.update(to.as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// 查询缓存；后端出错时按未命中处理
    pub fn get(&self, provider: &str, from: &str, to: &str, text: &str) -> Option<CachedTranslation> {
        if !self.enabled {
            return None;
        }

        let found = match self.store.get(&Self::key(provider, from, to, text)) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("读取缓存失败: {}", e);
                None
            }
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// 写入缓存；后端出错只记录日志
    pub fn put(&self, provider: &str, from: &str, to: &str, text: &str, value: CachedTranslation) {
        if !self.enabled {
            return;
        }

        if let Err(e) = self.store.put(&Self::key(provider, from, to, text), &value) {
            tracing::warn!("写入缓存失败: {}", e);
        }
    }

    pub fn forget(&self, provider: &str, from: &str, to: &str, text: &str) {
        if !self.enabled {
            return;
        }

        if let Err(e) = self.store.remove(&Self::key(provider, from, to, text)) {
            tracing::warn!("删除缓存条目失败: {}", e);
        }
    }

    /// 清空缓存
    pub fn clear(&self) -> TranslationResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.store.clear()?;
        tracing::info!("翻译缓存已清空");
        Ok(())
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            total_entries: if self.enabled {
                self.store.len().unwrap_or(0)
            } else {
                0
            },
        }
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("enabled", &self.enabled)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, provider: &str) -> CachedTranslation {
        CachedTranslation {
            translation: text.to_string(),
            provider: provider.to_string(),
        }
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = TranslationCache::memory();

        // 测试插入和获取
        cache.put("openai", "en", "tr", "Hello", entry("Merhaba", "openai"));
        assert_eq!(
            cache.get("openai", "en", "tr", "Hello"),
            Some(entry("Merhaba", "openai"))
        );
        assert_eq!(cache.get("deepl", "en", "tr", "Hello"), None);
        assert_eq!(cache.get("openai", "en", "de", "Hello"), None);

        // 测试删除
        cache.forget("openai", "en", "tr", "Hello");
        assert_eq!(cache.get("openai", "en", "tr", "Hello"), None);
    }

    #[test]
    fn test_cache_stats() {
        let cache = TranslationCache::memory();
        cache.put("openai", "en", "tr", "Hello", entry("Merhaba", "openai"));

        // 命中
        cache.get("openai", "en", "tr", "Hello");
        // 未命中
        cache.get("openai", "en", "tr", "World");

        let stats = cache.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_disabled_cache_is_noop() {
        let cache = TranslationCache::disabled();
        cache.put("openai", "en", "tr", "Hello", entry("Merhaba", "openai"));

        assert!(!cache.is_enabled());
        assert_eq!(cache.get("openai", "en", "tr", "Hello"), None);
        assert!(cache.clear().is_ok());
        assert_eq!(cache.stats().total_requests(), 0);
    }

    #[test]
    fn test_key_is_stable_and_distinct() {
        let a = TranslationCache::key("openai", "en", "tr", "Hello");
        assert_eq!(a, TranslationCache::key("openai", "en", "tr", "Hello"));
        assert_eq!(a.len(), 64);
        // 分隔符避免拼接歧义
        assert_ne!(
            TranslationCache::key("open", "aien", "tr", "x"),
            TranslationCache::key("openai", "en", "tr", "x")
        );
    }

    #[test]
    fn test_redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("cache.redb");

        {
            let cache = TranslationCache::new(Arc::new(RedbStore::open(&path).unwrap()));
            cache.put("deepl", "en", "tr", "Save", entry("Kaydet", "deepl"));
        }

        let cache = TranslationCache::new(Arc::new(RedbStore::open(&path).unwrap()));
        assert_eq!(
            cache.get("deepl", "en", "tr", "Save"),
            Some(entry("Kaydet", "deepl"))
        );
        assert_eq!(cache.stats().total_entries, 1);

        cache.clear().unwrap();
        assert_eq!(cache.get("deepl", "en", "tr", "Save"), None);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn test_redb_store_shared_by_two_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");

        let writer = TranslationCache::new(Arc::new(RedbStore::open(&path).unwrap()));
        let reader = TranslationCache::new(Arc::new(RedbStore::open(&path).unwrap()));

        writer.put("openai", "en", "fr", "Hello", entry("Bonjour", "openai"));
        assert_eq!(
            reader.get("openai", "en", "fr", "Hello"),
            Some(entry("Bonjour", "openai"))
        );
    }
}
