//! 同步引擎 - 排空待同步队列
//!
//! 一轮同步：
//! 1. 取走队列快照（`drain_snapshot`）
//! 2. 严格按顺序逐条提交，单条失败不会中断后续提交
//! 3. 有失败：失败的操作按原顺序放回队首，本轮结束，不在本轮内重试
//! 4. 全部成功：全量拉取并替换本地快照
//!
//! 任意时刻最多只有一轮同步在进行，重入调用直接返回 `Skipped`。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::reconcile;
use super::{SyncConfig, SyncState};
use crate::error::Result;
use crate::events::{event_builders, EventManager};
use crate::network::NetworkMonitor;
use crate::remote::RemoteStore;
use crate::storage::queue::ActionQueue;
use crate::storage::LocalStore;

/// 跳过同步的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySyncing,
    Offline,
    EmptyQueue,
}

/// 一轮同步的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    /// 全部提交成功，并已用远端数据替换本地快照
    Reconciled { applied: usize },
    /// 全部提交成功，但全量拉取失败，本地快照保持不变
    ReconcileFailed { applied: usize },
    /// 部分提交失败，失败项已放回队首
    Requeued { applied: usize, failed: usize },
}

/// 释放 `is_syncing` 锁存器
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct SyncEngine {
    store: Arc<LocalStore>,
    queue: Arc<ActionQueue>,
    remote: Arc<dyn RemoteStore>,
    monitor: Arc<NetworkMonitor>,
    events: Arc<EventManager>,
    config: SyncConfig,
    is_syncing: AtomicBool,
    state: RwLock<SyncState>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<LocalStore>,
        queue: Arc<ActionQueue>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<NetworkMonitor>,
        events: Arc<EventManager>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            queue,
            remote,
            monitor,
            events,
            config,
            is_syncing: AtomicBool::new(false),
            state: RwLock::new(SyncState::Idle),
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<ActionQueue> {
        &self.queue
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::Acquire)
    }

    async fn set_state(&self, new_state: SyncState) {
        let old_state = std::mem::replace(&mut *self.state.write(), new_state);
        if old_state != new_state {
            debug!("同步状态: {:?} -> {:?}", old_state, new_state);
            self.events
                .emit(event_builders::sync_state_changed(old_state, new_state))
                .await;
        }
    }

    async fn emit_pending_count(&self) {
        let count = self.queue.len().await;
        self.events.emit(event_builders::pending_count_changed(count)).await;
    }

    /// 执行一轮同步
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<SyncOutcome> {
        if !self.monitor.is_online() {
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("已有同步在进行，忽略本次触发");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        }
        let _guard = SyncingGuard(&self.is_syncing);

        if self.queue.is_empty().await {
            return Ok(SyncOutcome::Skipped(SkipReason::EmptyQueue));
        }

        let result = self.drain_and_reconcile().await;
        self.set_state(SyncState::Idle).await;

        if let Ok(outcome) = &result {
            let (applied, failed, reconciled) = match *outcome {
                SyncOutcome::Reconciled { applied } => (applied, 0, true),
                SyncOutcome::ReconcileFailed { applied } => (applied, 0, false),
                SyncOutcome::Requeued { applied, failed } => (applied, failed, false),
                SyncOutcome::Skipped(_) => (0, 0, false),
            };
            self.events
                .emit(event_builders::sync_completed(applied, failed, reconciled))
                .await;
        }
        result
    }

    async fn drain_and_reconcile(&self) -> Result<SyncOutcome> {
        self.set_state(SyncState::Draining).await;

        let drained = self.queue.drain_snapshot().await?;
        let total = drained.len();
        info!("🔄 开始同步 {} 条待提交操作", total);

        let interval = Duration::from_millis(self.config.action_interval_ms);
        let mut failed = Vec::new();
        for (index, pending) in drained.into_iter().enumerate() {
            if index > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            match self.remote.apply(&pending.action.route()).await {
                Ok(()) => debug!("✅ {} ({}) 已提交", pending.type_tag(), pending.id),
                Err(e) => {
                    if e.is_remote() {
                        warn!("❌ {} ({}) 提交失败: {}", pending.type_tag(), pending.id, e);
                    } else {
                        error!("❌ {} ({}) 提交异常: {}", pending.type_tag(), pending.id, e);
                    }
                    failed.push(pending);
                }
            }
        }
        let applied = total - failed.len();

        if !failed.is_empty() {
            let failed_count = failed.len();
            self.queue.requeue(failed).await?;
            self.emit_pending_count().await;
            warn!("同步结束: {} 条成功，{} 条失败已放回队列", applied, failed_count);
            return Ok(SyncOutcome::Requeued {
                applied,
                failed: failed_count,
            });
        }
        self.emit_pending_count().await;

        self.set_state(SyncState::Reconciling).await;
        match reconcile::reconcile(&self.store, self.remote.as_ref()).await {
            Ok(()) => {
                self.events.emit(event_builders::snapshot_replaced()).await;
                info!("✅ 同步完成: {} 条已提交并完成对齐", applied);
                Ok(SyncOutcome::Reconciled { applied })
            }
            Err(e) => {
                warn!("同步提交完成，但对齐失败: {}", e);
                Ok(SyncOutcome::ReconcileFailed { applied })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkStatus;
    use crate::remote::test_helpers::MockRemoteStore;
    use crate::storage::queue::{PendingAction, SyncAction};
    use crate::storage::{
        EntityKind, LogEntry, MemoryStorage, Normalize, Report, Task, TaskStatus,
    };
    use serde_json::json;

    struct Harness {
        engine: Arc<SyncEngine>,
        remote: Arc<MockRemoteStore>,
        monitor: Arc<NetworkMonitor>,
    }

    async fn harness(status: NetworkStatus) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(LocalStore::init(storage.clone()).await.unwrap());
        let queue = Arc::new(ActionQueue::load(storage).await.unwrap());
        let remote = Arc::new(MockRemoteStore::new());
        let monitor = Arc::new(NetworkMonitor::new(status));
        let engine = Arc::new(SyncEngine::new(
            store,
            queue,
            remote.clone(),
            monitor.clone(),
            Arc::new(EventManager::new(64)),
            SyncConfig::default(),
        ));
        Harness {
            engine,
            remote,
            monitor,
        }
    }

    #[tokio::test]
    async fn skips_when_offline_or_empty() {
        let h = harness(NetworkStatus::Offline).await;
        h.engine
            .queue()
            .enqueue(SyncAction::AddLog(LogEntry::normalize(&json!({ "id": "l1" }))))
            .await
            .unwrap();
        assert_eq!(
            h.engine.run_cycle().await.unwrap(),
            SyncOutcome::Skipped(SkipReason::Offline)
        );
        assert_eq!(h.engine.queue().len().await, 1);

        let h = harness(NetworkStatus::Online).await;
        assert_eq!(
            h.engine.run_cycle().await.unwrap(),
            SyncOutcome::Skipped(SkipReason::EmptyQueue)
        );
        assert_eq!(h.remote.apply_calls(), 0);
    }

    #[tokio::test]
    async fn failed_action_alone_returns_to_queue() {
        let h = harness(NetworkStatus::Online).await;
        h.remote.seed(EntityKind::Tasks, vec![json!({ "id": "task1", "status": "TODO" })]);
        h.remote.fail_on("task1");

        let queue = h.engine.queue();
        queue
            .enqueue(SyncAction::AddLog(LogEntry::normalize(&json!({ "id": "log1" }))))
            .await
            .unwrap();
        let b = queue
            .enqueue(SyncAction::UpdateTaskStatus {
                id: "task1".into(),
                status: TaskStatus::Completed,
            })
            .await
            .unwrap();
        queue
            .enqueue(SyncAction::AddReport(Report::normalize(&json!({ "id": "report1" }))))
            .await
            .unwrap();

        let outcome = h.engine.run_cycle().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Requeued { applied: 2, failed: 1 });

        let pending: Vec<PendingAction> = queue.pending().await;
        assert_eq!(pending, vec![b]);
        assert!(h.remote.row(EntityKind::Logs, "log1").is_some());
        assert!(h.remote.row(EntityKind::Reports, "report1").is_some());
        assert_eq!(h.remote.row(EntityKind::Tasks, "task1").unwrap()["status"], "TODO");
        assert_eq!(h.engine.state(), SyncState::Idle);
        assert!(!h.engine.is_syncing());
    }

    #[tokio::test]
    async fn full_success_empties_queue_and_reconciles() {
        let h = harness(NetworkStatus::Online).await;
        for id in ["t1", "t2"] {
            h.engine
                .queue()
                .enqueue(SyncAction::AddTask(Task::normalize(&json!({ "id": id }))))
                .await
                .unwrap();
        }

        let outcome = h.engine.run_cycle().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Reconciled { applied: 2 });
        assert!(h.engine.queue().is_empty().await);

        let snapshot = h.engine.store().snapshot();
        let mut ids: Vec<_> = snapshot.tasks.iter().map(|t| t.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn reconcile_failure_keeps_durable_snapshot() {
        let h = harness(NetworkStatus::Online).await;
        h.engine
            .store()
            .mutate(|s| s.insert(Task::normalize(&json!({ "id": "t1" }))))
            .unwrap();
        h.engine.store().flush().await.unwrap();
        h.engine
            .queue()
            .enqueue(SyncAction::AddTask(Task::normalize(&json!({ "id": "t1" }))))
            .await
            .unwrap();
        h.remote.set_fail_select(true);

        let outcome = h.engine.run_cycle().await.unwrap();
        assert_eq!(outcome, SyncOutcome::ReconcileFailed { applied: 1 });
        assert!(h.engine.queue().is_empty().await);
        assert_eq!(h.engine.store().snapshot().tasks[0].id, "t1");
    }

    #[tokio::test]
    async fn concurrent_trigger_is_a_no_op() {
        let h = harness(NetworkStatus::Online).await;
        h.remote.set_delay(Duration::from_millis(20));
        h.engine
            .queue()
            .enqueue(SyncAction::AddLog(LogEntry::normalize(&json!({ "id": "l1" }))))
            .await
            .unwrap();

        let (first, second) = tokio::join!(h.engine.run_cycle(), h.engine.run_cycle());
        assert_eq!(first.unwrap(), SyncOutcome::Reconciled { applied: 1 });
        assert_eq!(second.unwrap(), SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        assert_eq!(h.remote.apply_calls(), 1);
    }

    #[tokio::test]
    async fn actions_enqueued_mid_drain_wait_for_next_cycle() {
        let h = harness(NetworkStatus::Online).await;
        h.remote.set_delay(Duration::from_millis(20));
        h.engine
            .queue()
            .enqueue(SyncAction::AddLog(LogEntry::normalize(&json!({ "id": "l1" }))))
            .await
            .unwrap();

        let engine = h.engine.clone();
        let late = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            engine
                .queue()
                .enqueue(SyncAction::AddLog(LogEntry::normalize(&json!({ "id": "l2" }))))
                .await
                .unwrap()
        };
        let (outcome, late) = tokio::join!(h.engine.run_cycle(), late);

        assert_eq!(outcome.unwrap(), SyncOutcome::Reconciled { applied: 1 });
        assert_eq!(h.engine.queue().pending().await, vec![late]);
        assert_eq!(h.remote.apply_calls(), 1);

        h.monitor.set_status(NetworkStatus::Offline);
        assert_eq!(
            h.engine.run_cycle().await.unwrap(),
            SyncOutcome::Skipped(SkipReason::Offline)
        );
    }
}
