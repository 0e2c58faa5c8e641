//! 待同步操作队列
//!
//! - FIFO，持久化在 `deepshift_queue`
//! - `drain_snapshot` 原子地取走全部内容，排空期间新加入的操作留在活动队列里
//! - `requeue` 把失败的操作放回队首，保留原 ID 和时间戳
//! - 每次修改都在持有队列锁时落盘，持久化顺序与内存顺序一致

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::kv::DurableStorage;
use crate::storage::keys;
use crate::utils::{generate_id, TimeFormatter};

pub mod action;

pub use action::{GoalUpdate, LogStatusUpdate, RemoteOp, SiteVisitUpdate, SyncAction};

/// 队列中的一条待同步操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPendingAction", into = "RawPendingAction")]
pub struct PendingAction {
    /// 队列内唯一，重试时不变
    pub id: String,
    pub action: SyncAction,
    /// 入队时间（UTC 毫秒）
    pub timestamp: i64,
}

impl PendingAction {
    pub fn new(action: SyncAction) -> Self {
        Self {
            id: generate_id(),
            action,
            timestamp: TimeFormatter::now_utc_millis(),
        }
    }

    pub fn type_tag(&self) -> &'static str {
        self.action.type_tag()
    }
}

/// 持久化形式：`{id, type, payload, timestamp}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPendingAction {
    id: String,
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    timestamp: i64,
}

impl TryFrom<RawPendingAction> for PendingAction {
    type Error = String;

    fn try_from(raw: RawPendingAction) -> std::result::Result<Self, Self::Error> {
        let tagged = serde_json::json!({ "type": raw.action_type, "payload": raw.payload });
        let action = serde_json::from_value(tagged)
            .map_err(|e| format!("无法识别的操作 {}: {}", raw.action_type, e))?;
        Ok(Self {
            id: raw.id,
            action,
            timestamp: raw.timestamp,
        })
    }
}

impl From<PendingAction> for RawPendingAction {
    fn from(pending: PendingAction) -> Self {
        let mut tagged = serde_json::to_value(&pending.action).unwrap_or(Value::Null);
        let payload = tagged
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Self {
            id: pending.id,
            action_type: pending.action.type_tag().to_string(),
            payload,
            timestamp: pending.timestamp,
        }
    }
}

/// 持久化的待同步队列
#[derive(Debug)]
pub struct ActionQueue {
    storage: Arc<dyn DurableStorage>,
    actions: Mutex<VecDeque<PendingAction>>,
    /// 加载时无法解码的条目，原样保留
    unrecognized: Mutex<Vec<Value>>,
}

impl ActionQueue {
    /// 从持久化存储加载
    ///
    /// 当前版本无法识别的条目（未知类型或载荷不符）会移到
    /// `deepshift_queue_unrecognized`，既不路由也不丢弃。
    pub async fn load(storage: Arc<dyn DurableStorage>) -> Result<Self> {
        let stored = match storage.get(keys::QUEUE).await {
            Ok(value) => value,
            Err(e) => {
                warn!("读取待同步队列失败，按空队列处理: {}", e);
                None
            }
        };
        let mut unrecognized: Vec<Value> = match storage.get(keys::QUEUE_UNRECOGNIZED).await {
            Ok(Some(Value::Array(items))) => items,
            _ => Vec::new(),
        };

        let mut actions = VecDeque::new();
        let mut moved = 0usize;
        if let Some(Value::Array(entries)) = stored {
            for entry in entries {
                match serde_json::from_value::<PendingAction>(entry.clone()) {
                    Ok(pending) => actions.push_back(pending),
                    Err(e) => {
                        warn!("⚠️ 队列条目无法识别，已隔离: {}", e);
                        unrecognized.push(entry);
                        moved += 1;
                    }
                }
            }
        }

        let queue = Self {
            storage,
            actions: Mutex::new(actions),
            unrecognized: Mutex::new(unrecognized),
        };

        if moved > 0 {
            let unrecognized = queue.unrecognized.lock().await;
            queue
                .storage
                .set(keys::QUEUE_UNRECOGNIZED, &Value::Array(unrecognized.clone()))
                .await?;
            drop(unrecognized);
            let actions = queue.actions.lock().await;
            queue.persist(&actions).await?;
        }

        info!("✅ 待同步队列已加载: {} 条", queue.len().await);
        Ok(queue)
    }

    async fn persist(&self, actions: &VecDeque<PendingAction>) -> Result<()> {
        let value = serde_json::to_value(actions)?;
        self.storage.set(keys::QUEUE, &value).await
    }

    /// 追加一条操作，返回入队后的记录
    pub async fn enqueue(&self, action: SyncAction) -> Result<PendingAction> {
        let pending = PendingAction::new(action);
        let mut actions = self.actions.lock().await;
        actions.push_back(pending.clone());
        self.persist(&actions).await?;
        debug!("➕ 入队 {} ({}), 当前 {} 条", pending.type_tag(), pending.id, actions.len());
        Ok(pending)
    }

    /// 取走当前全部操作并清空活动队列
    pub async fn drain_snapshot(&self) -> Result<Vec<PendingAction>> {
        let mut actions = self.actions.lock().await;
        let drained: Vec<PendingAction> = actions.drain(..).collect();
        if let Err(e) = self.persist(&actions).await {
            // 没能落盘就不算取走
            actions.extend(drained);
            return Err(e);
        }
        Ok(drained)
    }

    /// 把操作放回队首，保持它们之间的相对顺序
    pub async fn requeue(&self, failed: Vec<PendingAction>) -> Result<()> {
        if failed.is_empty() {
            return Ok(());
        }
        let mut actions = self.actions.lock().await;
        for pending in failed.into_iter().rev() {
            actions.push_front(pending);
        }
        self.persist(&actions).await
    }

    pub async fn len(&self) -> usize {
        self.actions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.actions.lock().await.is_empty()
    }

    /// 队列内容的只读副本
    pub async fn pending(&self) -> Vec<PendingAction> {
        self.actions.lock().await.iter().cloned().collect()
    }

    /// 被隔离的无法识别条目
    pub async fn unrecognized(&self) -> Vec<Value> {
        self.unrecognized.lock().await.clone()
    }
}
