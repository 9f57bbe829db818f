//! 执行槽
//!
//! 限制同时运行的文件翻译数量，从而限制对外部服务的并发请求。
//! 获取槽位有等待上限，超时后由调用方决定延后重试。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::translation::error::{TranslationError, TranslationResult};

/// 全局执行槽
#[derive(Debug, Clone)]
pub struct ConcurrencySlots {
    semaphore: Arc<Semaphore>,
    limit: usize,
    wait: Duration,
}

/// 占用中的槽位，离开作用域时自动归还
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencySlots {
    pub fn new(limit: usize, wait: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            wait,
        }
    }

    /// 在等待上限内获取槽位；超时返回 `None`
    pub async fn acquire(&self) -> TranslationResult<Option<SlotGuard>> {
        match tokio::time::timeout(self.wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(Some(SlotGuard { _permit: permit })),
            Ok(Err(e)) => Err(TranslationError::ConcurrencyError(format!("执行槽已关闭: {}", e))),
            Err(_) => Ok(None),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 正在占用的槽位数
    pub fn running(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}
