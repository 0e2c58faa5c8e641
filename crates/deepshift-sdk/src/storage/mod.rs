//! 存储模块 - 离线优先的本地状态层
//!
//! 分层：
//! - `kv`: 持久化能力（sled / 内存）
//! - `normalize` + `entities`: 线上表示 ↔ 内存实体
//! - `snapshot`: 全部集合的不可变快照
//! - `queue`: 待同步操作队列
//! - `LocalStore`: 快照的生命周期（加载、乐观修改、落盘、替换、恢复、关闭）

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{DeepshiftSDKError, Result};

pub mod catalog;
pub mod entities;
pub mod entity_kind;
pub mod kv;
pub mod normalize;
pub mod queue;
pub mod snapshot;

pub use entities::*;
pub use entity_kind::EntityKind;
pub use kv::{DurableStorage, KvStore, MemoryStorage};
pub use normalize::Normalize;
pub use snapshot::{Collected, Snapshot};

/// 持久化键常量
pub mod keys {
    use super::EntityKind;

    /// 所有持久化键的前缀
    pub const PREFIX: &str = "deepshift_";
    /// 待同步队列
    pub const QUEUE: &str = "deepshift_queue";
    /// 当前版本无法识别的队列条目
    pub const QUEUE_UNRECOGNIZED: &str = "deepshift_queue_unrecognized";
    /// 当前会话用户
    pub const CURRENT_USER: &str = "deepshift_currentUser";

    /// 实体集合的持久化键
    pub fn collection(kind: EntityKind) -> String {
        format!("{}{}", PREFIX, kind.storage_key())
    }
}

/// 本地状态存储
///
/// 内存快照由同步锁保护，乐观修改是同步的；落盘是异步的，
/// 并且只写入自上次落盘以来身份变化过的集合。
#[derive(Debug)]
pub struct LocalStore {
    storage: Arc<dyn DurableStorage>,
    snapshot: RwLock<Snapshot>,
    /// 最近一次成功落盘的快照；同时串行化并发的 flush
    persisted: Mutex<Snapshot>,
    current_user: RwLock<Option<User>>,
    closed: AtomicBool,
}

impl LocalStore {
    /// 从持久化存储加载
    ///
    /// 缺失或损坏的键按空集合处理（技能/徽章使用默认目录），不会失败。
    pub async fn init(storage: Arc<dyn DurableStorage>) -> Result<Self> {
        let snapshot = load_snapshot(storage.as_ref()).await;
        let current_user = match storage.get(keys::CURRENT_USER).await {
            Ok(Some(raw)) if raw.is_object() => Some(User::normalize(&raw)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("读取当前用户失败，按未登录处理: {}", e);
                None
            }
        };

        tracing::info!(
            "✅ 本地存储已加载: tasks={}, logs={}, current_user={:?}",
            snapshot.tasks.len(),
            snapshot.logs.len(),
            current_user.as_ref().map(|u| u.id.as_str())
        );

        Ok(Self {
            storage,
            persisted: Mutex::new(snapshot.clone()),
            snapshot: RwLock::new(snapshot),
            current_user: RwLock::new(current_user),
            closed: AtomicBool::new(false),
        })
    }

    pub fn storage(&self) -> &Arc<dyn DurableStorage> {
        &self.storage
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeepshiftSDKError::ShuttingDown("本地存储已关闭".to_string()));
        }
        Ok(())
    }

    /// 当前快照（只复制指针）
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// 同步地应用一次本地修改
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> Result<R> {
        self.ensure_open()?;
        let mut snapshot = self.snapshot.write();
        Ok(f(&mut snapshot))
    }

    /// 把变化过的集合写入持久化存储，返回写入的集合数
    pub async fn flush(&self) -> Result<usize> {
        let mut persisted = self.persisted.lock().await;
        let current = self.snapshot();
        let changed = current.changed_kinds(&persisted);

        for kind in &changed {
            self.storage
                .set(&keys::collection(*kind), &current.raw(*kind))
                .await?;
            persisted.adopt(*kind, &current);
        }

        if !changed.is_empty() {
            tracing::debug!("💾 快照落盘: {:?}", changed);
        }
        Ok(changed.len())
    }

    /// 整体替换快照并落盘
    pub async fn replace(&self, snapshot: Snapshot) -> Result<()> {
        self.ensure_open()?;
        *self.snapshot.write() = snapshot;
        self.flush().await?;
        Ok(())
    }

    /// 丢弃内存中的快照，回到最近一次落盘的状态
    pub async fn restore_from_durable(&self) -> Result<()> {
        let mut persisted = self.persisted.lock().await;
        let snapshot = load_snapshot(self.storage.as_ref()).await;
        *self.snapshot.write() = snapshot.clone();
        *persisted = snapshot;
        tracing::info!("🔄 快照已从本地持久化数据恢复");
        Ok(())
    }

    /// 落盘并关闭；之后的修改会返回 `ShuttingDown`
    pub async fn teardown(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let flushed = self.flush().await;
        self.closed.store(true, Ordering::Release);
        flushed?;
        tracing::info!("本地存储已关闭");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user.read().clone()
    }

    pub async fn set_current_user(&self, user: User) -> Result<()> {
        self.ensure_open()?;
        self.storage.set(keys::CURRENT_USER, &user.to_raw()).await?;
        *self.current_user.write() = Some(user);
        Ok(())
    }

    pub async fn clear_current_user(&self) -> Result<()> {
        self.storage.remove(keys::CURRENT_USER).await?;
        *self.current_user.write() = None;
        Ok(())
    }
}

/// 读取全部集合；单个键读取失败只影响该集合
async fn load_snapshot(storage: &dyn DurableStorage) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for kind in EntityKind::ALL {
        let key = keys::collection(kind);
        let raw = match storage.get(&key).await {
            Ok(raw) => raw.unwrap_or(Value::Null),
            Err(e) => {
                tracing::warn!("读取 {} 失败，按空集合处理: {}", key, e);
                Value::Null
            }
        };
        snapshot.load_raw(kind, &raw);
    }
    snapshot.with_default_catalogs()
}
