//! 远端存储能力
//!
//! 核心逻辑只依赖这个 trait；REST 后端、数据库客户端或测试桩都可以替换使用。

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::storage::queue::RemoteOp;
use crate::storage::EntityKind;

pub mod rest;

pub use rest::RestRemoteStore;

#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// 读取整张表
    async fn select(&self, kind: EntityKind) -> Result<Vec<Value>>;

    async fn insert(&self, kind: EntityKind, row: &Value) -> Result<()>;

    /// 按 ID 更新部分字段
    async fn update(&self, kind: EntityKind, id: &str, patch: &Value) -> Result<()>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// 执行一次路由后的操作
    async fn apply(&self, op: &RemoteOp) -> Result<()> {
        match op {
            RemoteOp::Insert { kind, row } => self.insert(*kind, row).await,
            RemoteOp::UpdateById { kind, id, patch } => self.update(*kind, id, patch).await,
            RemoteOp::DeleteById { kind, id } => self.delete(*kind, id).await,
        }
    }
}
