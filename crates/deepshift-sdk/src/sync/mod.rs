/// 离线优先同步模块
///
/// 职责：
/// - 乐观修改（第一阶段，纯本地、同步执行）
/// - 远端确认或入队（第二阶段）
/// - 排空待同步队列，失败的操作放回队首
/// - 全部成功后全量拉取并替换本地快照
pub mod dispatcher;
pub mod engine;
pub mod optimistic;
pub mod reconcile;

pub use dispatcher::{Confirmation, Dispatcher};
pub use engine::{SkipReason, SyncEngine, SyncOutcome};
pub use reconcile::{fetch_snapshot, reconcile};

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum SyncState {
    /// 空闲
    #[default]
    Idle,
    /// 正在逐条提交队列中的操作
    Draining,
    /// 正在全量拉取远端数据
    Reconciling,
}

/// 同步配置
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncConfig {
    /// 相邻两次远端提交之间的间隔（毫秒），仅用于界面节奏，不是退避
    pub action_interval_ms: u64,
    /// 启动时若在线则全量拉取一次
    pub refresh_on_start: bool,
    /// 离线→在线时自动同步
    pub sync_on_reconnect: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            action_interval_ms: 0,
            refresh_on_start: true,
            sync_on_reconnect: true,
        }
    }
}
