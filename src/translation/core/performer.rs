//! 服务回退链
//!
//! 按顺序尝试各个翻译服务：先查缓存，再调用服务，第一个成功的结果即返回。
//! 单个服务的失败只记录下来，全部失败时才向上返回汇总错误。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::stats::ServiceStats;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::masking::{self, MaskedText, Restored};
use crate::translation::providers::ProviderRegistry;
use crate::translation::storage::{CachedTranslation, TranslationCache};

/// 一次翻译请求
#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub text: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub providers: &'a [String],
}

/// 一次成功的翻译
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationOutput {
    pub translation: String,
    pub provider: String,
    pub cache_hit: bool,
    pub duration_secs: f64,
    /// 服务丢失了占位符，译文已退回原文
    pub degraded: bool,
}

impl TranslationOutput {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }
}

/// 翻译执行器
#[derive(Debug, Clone)]
pub struct TranslationPerformer {
    registry: ProviderRegistry,
    cache: TranslationCache,
    stats: Arc<ServiceStats>,
}

impl TranslationPerformer {
    pub fn new(registry: ProviderRegistry, cache: TranslationCache) -> Self {
        Self {
            registry,
            cache,
            stats: Arc::new(ServiceStats::default()),
        }
    }

    pub fn with_stats(mut self, stats: Arc<ServiceStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// 确定服务尝试顺序
    ///
    /// 依次为调用方指定的服务、配置的默认服务、回退列表；去重并过滤掉未注册的服务。
    /// 一个都不剩时使用全部已注册服务。
    pub fn resolve_provider_order(
        &self,
        requested: Option<&str>,
        configured: &str,
        fallback: &[String],
    ) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let candidates = requested
            .into_iter()
            .chain(std::iter::once(configured))
            .chain(fallback.iter().map(String::as_str));

        for name in candidates {
            if self.registry.contains(name) && !order.iter().any(|n| n == name) {
                order.push(name.to_string());
            }
        }

        if order.is_empty() {
            order = self.registry.names();
        }
        order
    }

    /// 执行翻译
    pub async fn perform(&self, request: TranslationRequest<'_>) -> TranslationResult<TranslationOutput> {
        let masked = masking::mask(request.text);
        let mut failures = Vec::new();

        for name in request.providers {
            let Some(provider) = self.registry.get(name) else {
                continue;
            };

            if let Some(cached) = self.cache.get(name, request.from, request.to, &masked.normalized) {
                tracing::debug!("缓存命中: {} ({} → {})", name, request.from, request.to);
                self.stats.inc_cache_hits();
                let restored = self.restore(&cached.translation, &masked, &cached.provider, request.text);
                return Ok(TranslationOutput {
                    translation: restored.text,
                    provider: cached.provider,
                    cache_hit: true,
                    duration_secs: 0.0,
                    degraded: restored.degraded,
                });
            }
            self.stats.inc_cache_misses();

            let start = Instant::now();
            let translated = match provider
                .translate(&masked.normalized, Some(request.from), Some(request.to))
                .await
            {
                Ok(translated) => translated,
                Err(e) => {
                    tracing::warn!("翻译服务失败，尝试下一个: {}", e);
                    self.stats.inc_provider_failures();
                    failures.push(e);
                    continue;
                }
            };
            let duration = start.elapsed();

            // 缓存里存服务的原始输出，命中时再用本次的标记表还原
            self.cache.put(
                name,
                request.from,
                request.to,
                &masked.normalized,
                CachedTranslation {
                    translation: translated.clone(),
                    provider: name.clone(),
                },
            );

            let restored = self.restore(&translated, &masked, name, request.text);
            return Ok(TranslationOutput {
                translation: restored.text,
                provider: name.clone(),
                cache_hit: false,
                duration_secs: duration.as_secs_f64(),
                degraded: restored.degraded,
            });
        }

        if failures.is_empty() {
            Err(TranslationError::NoProviders)
        } else {
            Err(TranslationError::ExhaustedProviders { failures })
        }
    }

    fn restore(&self, translated: &str, masked: &MaskedText, provider: &str, source: &str) -> Restored {
        let restored = masking::restore(translated, masked);
        if restored.degraded {
            tracing::warn!("{} 丢失了占位符，已退回原文: {}", provider, source);
            self.stats.inc_degraded_restores();
        }
        restored
    }

    /// 删除这段文本在各个服务下的缓存
    pub fn forget(&self, text: &str, from: &str, to: &str, providers: &[String]) {
        let masked = masking::mask(text);
        for name in providers {
            self.cache.forget(name, from, to, &masked.normalized);
        }
    }
}
