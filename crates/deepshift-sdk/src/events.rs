//! 事件系统模块
//!
//! 功能包括：
//! - 待同步数量变化（“N 项更改待同步”角标）
//! - 同步状态机迁移、同步结果
//! - 网络状态变化
//! - 快照被整体替换（全量拉取之后）
//! - 事件广播和订阅机制

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::network::NetworkStatus;
use crate::sync::SyncState;
use crate::utils::TimeFormatter;

/// SDK 事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SDKEvent {
    /// 待同步数量变化
    PendingCountChanged { count: usize, timestamp: i64 },
    /// 操作进入待同步队列
    ActionQueued {
        action_id: String,
        action_type: String,
        timestamp: i64,
    },
    /// 同步状态迁移
    SyncStateChanged {
        old_state: SyncState,
        new_state: SyncState,
        timestamp: i64,
    },
    /// 一轮同步结束
    SyncCompleted {
        applied: usize,
        failed: usize,
        reconciled: bool,
        timestamp: i64,
    },
    NetworkStatusChanged {
        old_status: NetworkStatus,
        new_status: NetworkStatus,
        timestamp: i64,
    },
    /// 本地快照被整体替换
    SnapshotReplaced { timestamp: i64 },
    /// 用户获得徽章
    BadgeAwarded {
        user_id: String,
        badge_id: String,
        timestamp: i64,
    },
}

impl SDKEvent {
    /// 获取事件类型字符串
    pub fn event_type(&self) -> &'static str {
        match self {
            SDKEvent::PendingCountChanged { .. } => "pending_count_changed",
            SDKEvent::ActionQueued { .. } => "action_queued",
            SDKEvent::SyncStateChanged { .. } => "sync_state_changed",
            SDKEvent::SyncCompleted { .. } => "sync_completed",
            SDKEvent::NetworkStatusChanged { .. } => "network_status_changed",
            SDKEvent::SnapshotReplaced { .. } => "snapshot_replaced",
            SDKEvent::BadgeAwarded { .. } => "badge_awarded",
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            SDKEvent::PendingCountChanged { timestamp, .. }
            | SDKEvent::ActionQueued { timestamp, .. }
            | SDKEvent::SyncStateChanged { timestamp, .. }
            | SDKEvent::SyncCompleted { timestamp, .. }
            | SDKEvent::NetworkStatusChanged { timestamp, .. }
            | SDKEvent::SnapshotReplaced { timestamp }
            | SDKEvent::BadgeAwarded { timestamp, .. } => *timestamp,
        }
    }
}

/// 事件过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// 事件类型过滤器
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn matches(&self, event: &SDKEvent) -> bool {
        match &self.event_types {
            Some(types) => types.iter().any(|t| t == event.event_type()),
            None => true,
        }
    }
}

/// 事件监听器类型
pub type EventListener = Box<dyn Fn(&SDKEvent) + Send + Sync>;

/// 事件管理器
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<SDKEvent>,
    /// 事件监听器映射（`*` 表示全部事件）
    listeners: Arc<tokio::sync::RwLock<HashMap<String, Vec<EventListener>>>>,
    stats: Arc<tokio::sync::RwLock<EventStats>>,
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    pub total_events: u64,
    pub events_by_type: HashMap<String, u64>,
    pub listener_count: usize,
    pub last_event_time: Option<i64>,
}

impl EventManager {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            listeners: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            stats: Arc::new(tokio::sync::RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    pub async fn emit(&self, event: SDKEvent) {
        debug!("Emitting event: {}", event.event_type());

        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 无订阅者时 send 会失败，属正常场景
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        let listeners = self.listeners.read().await;
        for key in [event.event_type(), "*"] {
            if let Some(event_listeners) = listeners.get(key) {
                for listener in event_listeners {
                    listener(&event);
                }
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SDKEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        FilteredEventReceiver::new(self.sender.subscribe(), filter)
    }

    /// 添加事件监听器；`event_type` 为 `*` 时监听全部事件
    pub async fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&SDKEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().await;
        listeners
            .entry(event_type.to_string())
            .or_default()
            .push(Box::new(listener));

        let mut stats = self.stats.write().await;
        stats.listener_count = listeners.values().map(Vec::len).sum();

        info!("Added listener for event type: {}", event_type);
    }

    pub async fn clear_listeners(&self) {
        self.listeners.write().await.clear();
        self.stats.write().await.listener_count = 0;
        info!("Cleared all event listeners");
    }

    pub async fn get_stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// 带过滤的事件接收器
pub struct FilteredEventReceiver {
    receiver: broadcast::Receiver<SDKEvent>,
    filter: EventFilter,
}

impl FilteredEventReceiver {
    pub fn new(receiver: broadcast::Receiver<SDKEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// 接收下一个匹配的事件
    pub async fn recv(&mut self) -> Result<SDKEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

/// 事件构造器
pub mod event_builders {
    use super::*;

    pub fn pending_count_changed(count: usize) -> SDKEvent {
        SDKEvent::PendingCountChanged {
            count,
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn action_queued(action_id: &str, action_type: &str) -> SDKEvent {
        SDKEvent::ActionQueued {
            action_id: action_id.to_string(),
            action_type: action_type.to_string(),
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn sync_state_changed(old_state: SyncState, new_state: SyncState) -> SDKEvent {
        SDKEvent::SyncStateChanged {
            old_state,
            new_state,
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn sync_completed(applied: usize, failed: usize, reconciled: bool) -> SDKEvent {
        SDKEvent::SyncCompleted {
            applied,
            failed,
            reconciled,
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn network_status_changed(old_status: NetworkStatus, new_status: NetworkStatus) -> SDKEvent {
        SDKEvent::NetworkStatusChanged {
            old_status,
            new_status,
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn snapshot_replaced() -> SDKEvent {
        SDKEvent::SnapshotReplaced {
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn badge_awarded(user_id: &str, badge_id: &str) -> SDKEvent {
        SDKEvent::BadgeAwarded {
            user_id: user_id.to_string(),
            badge_id: badge_id.to_string(),
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_event_listeners() {
        let manager = EventManager::new(16);
        let counter = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let all_clone = all.clone();

        manager
            .add_listener("pending_count_changed", move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        manager
            .add_listener("*", move |_| {
                all_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        for count in 0..3 {
            manager.emit(event_builders::pending_count_changed(count)).await;
        }
        manager.emit(event_builders::snapshot_replaced()).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(all.load(Ordering::SeqCst), 4);

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_events, 4);
        assert_eq!(stats.listener_count, 2);
        assert_eq!(stats.events_by_type["pending_count_changed"], 3);
    }

    #[tokio::test]
    async fn test_filtered_subscriber_skips_other_events() {
        let manager = EventManager::new(16);
        let mut receiver = manager.subscribe_filtered(
            EventFilter::new().with_event_types(vec!["badge_awarded".to_string()]),
        );

        manager.emit(event_builders::pending_count_changed(1)).await;
        manager.emit(event_builders::badge_awarded("s1", "b1")).await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "badge_awarded");
        assert!(event.timestamp() > 0);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let manager = EventManager::new(0);
        assert_eq!(manager.subscriber_count(), 0);
        manager.emit(event_builders::sync_completed(1, 0, true)).await;
        assert_eq!(manager.get_stats().await.total_events, 1);
    }
}
