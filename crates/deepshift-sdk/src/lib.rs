//! Deepshift SDK - 离线优先的实习管理数据层
//!
//! 本 SDK 提供：
//! - 💾 本地持久化快照：断网、重启后数据仍在
//! - 🔗 待同步队列：离线修改按顺序保存，联网后逐条提交
//! - 📡 网络状态监控：离线→在线时自动同步
//! - 🔄 全量对齐：队列全部提交成功后用远端数据替换本地快照
//! - 🏅 成就徽章：连续打卡、完成任务、获得表扬
//! - ⚙️ 事件系统：待同步数量、同步状态、网络状态
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use deepshift_sdk::{DeepshiftConfig, DeepshiftSDK, NewTask};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     deepshift_sdk::init_tracing("info");
//!
//!     let config = DeepshiftConfig::builder()
//!         .data_dir("/path/to/data")
//!         .remote_url("https://project.example.co")
//!         .api_key("anon-key")
//!         .build();
//!     let sdk = DeepshiftSDK::initialize(config).await?;
//!
//!     // 离线时也会立即出现在本地快照里
//!     let committed = sdk
//!         .add_task(NewTask {
//!             title: "Write the API".into(),
//!             assigned_to_id: "student-1".into(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("task {} -> {:?}", committed.entity_id, committed.confirmation);
//!     println!("pending: {}", sdk.pending_count().await);
//!
//!     sdk.shutdown().await?;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod awards;
pub mod error;
pub mod events;
pub mod network;
pub mod remote;
pub mod sdk;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod version;
pub mod views;

// 重新导出核心类型，方便使用
pub use error::{DeepshiftSDKError, Result};
pub use events::{EventFilter, EventManager, SDKEvent};
pub use network::{NetworkMonitor, NetworkStatus, NetworkStatusEvent, NetworkStatusListener};
pub use remote::{RemoteStore, RestRemoteStore};
pub use sdk::{
    init_tracing, Committed, DeepshiftConfig, DeepshiftConfigBuilder, DeepshiftSDK,
    HttpClientConfig,
};
pub use storage::queue::{ActionQueue, GoalUpdate, PendingAction, RemoteOp, SiteVisitUpdate, SyncAction};
pub use storage::{DurableStorage, EntityKind, KvStore, LocalStore, MemoryStorage, Normalize, Snapshot};
pub use sync::optimistic::{
    NewEvaluation, NewGoal, NewLeaveRequest, NewLog, NewMessage, NewReport, NewResource,
    NewSiteVisit, NewSkillAssessment, NewTask, NewTaskComment,
};
pub use sync::{Confirmation, SyncConfig, SyncEngine, SyncOutcome, SyncState};
pub use utils::TimeFormatter;
pub use version::SDK_VERSION;
pub use views::{compose_task_view, TaskViewComposer};
