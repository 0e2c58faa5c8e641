//! 第二阶段：远端确认或入队
//!
//! 在线、队列为空且没有同步在进行时，直接提交到远端；
//! 其余情况（离线、提交失败、前面还有未同步的操作）一律入队，保证 FIFO。
//! 检查、直接提交和失败入队在同一把锁内完成，并发的确认按调用顺序串行。

use std::sync::Arc;

use tokio::sync::Mutex;

use tracing::{debug, warn};

use super::SyncEngine;
use crate::error::Result;
use crate::events::event_builders;
use crate::storage::queue::{PendingAction, SyncAction};

/// 第二阶段的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// 远端已确认
    Applied,
    /// 已进入待同步队列
    Queued(PendingAction),
}

impl Confirmation {
    pub fn is_applied(&self) -> bool {
        matches!(self, Confirmation::Applied)
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    engine: Arc<SyncEngine>,
    confirm_lock: Arc<Mutex<()>>,
}

impl Dispatcher {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            confirm_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 可以跳过队列直接提交吗
    async fn can_apply_directly(&self) -> bool {
        self.engine.monitor().is_online()
            && !self.engine.is_syncing()
            && self.engine.queue().is_empty().await
    }

    pub async fn confirm(&self, action: SyncAction) -> Result<Confirmation> {
        // 直接提交进行中时，后来的确认不能看到“空队列”而越过它
        let _guard = self.confirm_lock.lock().await;

        if self.can_apply_directly().await {
            match self.engine.remote().apply(&action.route()).await {
                Ok(()) => {
                    debug!("✅ {} 已直接提交", action.type_tag());
                    return Ok(Confirmation::Applied);
                }
                Err(e) => warn!("{} 直接提交失败，转入待同步队列: {}", action.type_tag(), e),
            }
        }

        let queue = self.engine.queue();
        let pending = queue.enqueue(action).await?;
        let events = self.engine.events();
        events
            .emit(event_builders::action_queued(&pending.id, pending.type_tag()))
            .await;
        events
            .emit(event_builders::pending_count_changed(queue.len().await))
            .await;
        Ok(Confirmation::Queued(pending))
    }
}
