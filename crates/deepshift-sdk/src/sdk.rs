//! 统一 SDK 接口 - DeepshiftSDK 主入口
//!
//! 分层架构设计：
//! ```text
//! DeepshiftSDK (业务逻辑层)
//!   ├── LocalStore      (本地快照 + 持久化)
//!   ├── ActionQueue     (待同步队列)
//!   ├── SyncEngine      (排空队列 + 全量对齐)
//!   ├── Dispatcher      (第二阶段：直接提交或入队)
//!   ├── EventManager    (事件系统层)
//!   └── NetworkMonitor  (网络监控层)
//! ```
//!
//! 每次修改都走同一条流水线：
//! 1. 第一阶段：在本地快照上同步地应用修改（`sync::optimistic`）
//! 2. 落盘变化过的集合
//! 3. 第二阶段：远端确认或入队（`Dispatcher::confirm`）
//! 4. 判定并授予新获得的徽章

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::awards;
use crate::error::{DeepshiftSDKError, Result};
use crate::events::{event_builders, EventFilter, EventManager, FilteredEventReceiver, SDKEvent};
use crate::network::{spawn_reconnect_sync, NetworkMonitor, NetworkStatus};
use crate::remote::{RemoteStore, RestRemoteStore};
use crate::storage::queue::{ActionQueue, GoalUpdate, PendingAction, SiteVisitUpdate, SyncAction};
use crate::storage::{
    DurableStorage, KvStore, LeaveStatus, LocalStore, MemoryStorage, Snapshot, Task, TaskStatus, User,
};
use crate::sync::optimistic::{
    self, NewEvaluation, NewGoal, NewLeaveRequest, NewLog, NewMessage, NewReport, NewResource,
    NewSiteVisit, NewSkillAssessment, NewTask, NewTaskComment,
};
use crate::sync::{reconcile, Confirmation, Dispatcher, SyncConfig, SyncEngine, SyncOutcome, SyncState};
use crate::views::TaskViewComposer;

// ========== 配置 ==========

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(30),
        }
    }
}

/// Deepshift SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepshiftConfig {
    /// 数据存储目录；`None` 表示只保存在内存中
    pub data_dir: Option<PathBuf>,
    /// 远端服务基础 URL
    pub remote_url: String,
    /// 远端 API Key
    pub api_key: String,
    /// 同步配置
    pub sync: SyncConfig,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 事件缓冲区大小
    pub event_capacity: usize,
    /// 没有平台监听器时的初始网络状态
    pub initial_network_status: NetworkStatus,
}

impl Default for DeepshiftConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            remote_url: String::new(),
            api_key: String::new(),
            sync: SyncConfig::default(),
            http_client_config: HttpClientConfig::default(),
            event_capacity: 256,
            initial_network_status: NetworkStatus::Online,
        }
    }
}

/// Deepshift SDK 配置构建器
#[derive(Debug, Default)]
pub struct DeepshiftConfigBuilder {
    config: DeepshiftConfig,
}

impl DeepshiftConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// 不落盘，进程退出即丢失
    pub fn in_memory(mut self) -> Self {
        self.config.data_dir = None;
        self
    }

    pub fn remote_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.remote_url = url.into();
        self
    }

    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.config.sync = config;
        self
    }

    /// 相邻两次远端提交之间的间隔（毫秒）
    pub fn action_interval_ms(mut self, interval: u64) -> Self {
        self.config.sync.action_interval_ms = interval;
        self
    }

    pub fn refresh_on_start(mut self, enabled: bool) -> Self {
        self.config.sync.refresh_on_start = enabled;
        self
    }

    pub fn sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.config.sync.sync_on_reconnect = enabled;
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn initial_network_status(mut self, status: NetworkStatus) -> Self {
        self.config.initial_network_status = status;
        self
    }

    pub fn build(self) -> DeepshiftConfig {
        self.config
    }
}

impl DeepshiftConfig {
    pub fn builder() -> DeepshiftConfigBuilder {
        DeepshiftConfigBuilder::new()
    }
}

/// 初始化 tracing 日志；`RUST_LOG` 优先，否则使用 `default_level`
///
/// 重复调用是安全的，只有第一次生效。
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

// ========== SDK ==========

/// 一次修改的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    /// 被修改（或新建）记录的 ID
    pub entity_id: String,
    pub confirmation: Confirmation,
}

/// 统一 SDK 主接口
#[derive(Debug)]
pub struct DeepshiftSDK {
    config: DeepshiftConfig,
    store: Arc<LocalStore>,
    queue: Arc<ActionQueue>,
    engine: Arc<SyncEngine>,
    dispatcher: Dispatcher,
    monitor: Arc<NetworkMonitor>,
    events: Arc<EventManager>,
    task_views: TaskViewComposer,
    background_tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl DeepshiftSDK {
    /// 异步初始化 SDK
    ///
    /// 使用 sled（或内存）持久化和 REST 远端。
    pub async fn initialize(config: DeepshiftConfig) -> Result<Arc<Self>> {
        Self::validate_config(&config)?;

        let storage: Arc<dyn DurableStorage> = match &config.data_dir {
            Some(dir) => Arc::new(KvStore::open(dir).await?),
            None => Arc::new(MemoryStorage::new()),
        };
        let remote = Arc::new(RestRemoteStore::new(
            &config.remote_url,
            &config.api_key,
            &config.http_client_config,
        )?);
        let monitor = Arc::new(NetworkMonitor::new(config.initial_network_status));

        Self::initialize_with(config, storage, remote, monitor).await
    }

    /// 使用自定义的持久化、远端和网络监控初始化
    ///
    /// 分层初始化顺序：
    /// 1. 存储层 → 2. 队列 → 3. 事件层 → 4. 同步层 → 5. 网络层
    pub async fn initialize_with(
        config: DeepshiftConfig,
        storage: Arc<dyn DurableStorage>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<NetworkMonitor>,
    ) -> Result<Arc<Self>> {
        info!("正在初始化 DeepshiftSDK...");
        if config.event_capacity == 0 {
            return Err(DeepshiftSDKError::Config("event_capacity 必须大于 0".to_string()));
        }

        let store = Arc::new(LocalStore::init(storage.clone()).await?);
        let queue = Arc::new(ActionQueue::load(storage).await?);
        let events = Arc::new(EventManager::new(config.event_capacity));
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            queue.clone(),
            remote,
            monitor.clone(),
            events.clone(),
            config.sync.clone(),
        ));

        monitor.start().await?;
        let mut background = vec![spawn_network_events(&monitor, events.clone())];
        if config.sync.sync_on_reconnect {
            background.push(spawn_reconnect_sync(&monitor, engine.clone()));
        }

        let sdk = Arc::new(Self {
            dispatcher: Dispatcher::new(engine.clone()),
            config,
            store,
            queue,
            engine,
            monitor,
            events,
            task_views: TaskViewComposer::new(),
            background_tasks: parking_lot::Mutex::new(background),
            shutting_down: AtomicBool::new(false),
        });

        if sdk.config.sync.refresh_on_start && sdk.monitor.is_online() {
            if let Err(e) = sdk.refresh_snapshot().await {
                warn!("启动时刷新失败，使用本地快照: {}", e);
            }
        }

        info!(
            "✅ DeepshiftSDK 初始化完成 (online: {}, pending: {})",
            sdk.monitor.is_online(),
            sdk.queue.len().await
        );
        Ok(sdk)
    }

    fn validate_config(config: &DeepshiftConfig) -> Result<()> {
        if config.remote_url.trim().is_empty() {
            return Err(DeepshiftSDKError::Config("remote_url 不能为空".to_string()));
        }
        if let Some(dir) = &config.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(DeepshiftSDKError::Config("数据目录不能为空".to_string()));
            }
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(DeepshiftSDKError::ShuttingDown("SDK 已关闭".to_string()));
        }
        Ok(())
    }

    pub fn config(&self) -> &DeepshiftConfig {
        &self.config
    }

    // ========== 修改流水线 ==========

    async fn commit<F>(&self, phase1: F) -> Result<Committed>
    where
        F: FnOnce(&mut Snapshot) -> Result<SyncAction>,
    {
        self.ensure_running()?;
        let action = self.store.mutate(phase1)??;
        let earned = awards::earned_after(&self.store.snapshot(), &action);
        let committed = self.persist_and_confirm(action).await?;

        for badge in earned {
            self.grant_badge(&badge.user_id, badge.badge_id).await?;
        }
        Ok(committed)
    }

    async fn persist_and_confirm(&self, action: SyncAction) -> Result<Committed> {
        // 落盘失败不能丢掉远端操作，继续走第二阶段
        if let Err(e) = self.store.flush().await {
            warn!("⚠️ 快照落盘失败: {}", e);
        }
        let entity_id = action.entity_id().to_string();
        let confirmation = self.dispatcher.confirm(action).await?;
        Ok(Committed {
            entity_id,
            confirmation,
        })
    }

    async fn grant_badge(&self, user_id: &str, badge_id: &str) -> Result<Option<Committed>> {
        self.ensure_running()?;
        let Some(action) = self
            .store
            .mutate(|snapshot| optimistic::award_badge(snapshot, user_id, badge_id))?
        else {
            return Ok(None);
        };
        let committed = self.persist_and_confirm(action).await?;
        info!("🏅 用户 {} 获得徽章 {}", user_id, badge_id);
        self.events
            .emit(event_builders::badge_awarded(user_id, badge_id))
            .await;
        Ok(Some(committed))
    }

    pub async fn add_log(&self, draft: NewLog) -> Result<Committed> {
        self.commit(|s| optimistic::add_log(s, draft)).await
    }

    /// 导师审批日志：通过 / 驳回
    pub async fn approve_log(&self, log_id: &str, approved: bool, comment: Option<String>) -> Result<Committed> {
        self.commit(|s| optimistic::review_log(s, log_id, approved, comment))
            .await
    }

    pub async fn add_task(&self, draft: NewTask) -> Result<Committed> {
        self.commit(|s| optimistic::add_task(s, draft)).await
    }

    pub async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<Committed> {
        self.commit(|s| optimistic::update_task_status(s, task_id, status))
            .await
    }

    pub async fn submit_deliverable(
        &self,
        task_id: &str,
        url: impl Into<String>,
        notes: Option<String>,
    ) -> Result<Committed> {
        let url = url.into();
        self.commit(|s| optimistic::submit_deliverable(s, task_id, url, notes))
            .await
    }

    /// 以当前用户身份评论任务
    pub async fn add_task_comment(&self, task_id: &str, content: impl Into<String>) -> Result<Committed> {
        let author = self
            .store
            .current_user()
            .ok_or_else(|| DeepshiftSDKError::InvalidArgument("评论前需要先设置当前用户".to_string()))?;
        let draft = NewTaskComment {
            task_id: task_id.to_string(),
            author_id: author.id,
            content: content.into(),
        };
        self.commit(|s| optimistic::add_task_comment(s, draft)).await
    }

    pub async fn give_feedback(
        &self,
        task_id: &str,
        feedback_type: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Committed> {
        let (feedback_type, comment) = (feedback_type.into(), comment.into());
        self.commit(|s| optimistic::give_feedback(s, task_id, feedback_type, comment))
            .await
    }

    pub async fn add_report(&self, draft: NewReport) -> Result<Committed> {
        self.commit(|s| optimistic::add_report(s, draft)).await
    }

    pub async fn add_goal(&self, draft: NewGoal) -> Result<Committed> {
        self.commit(|s| optimistic::add_goal(s, draft)).await
    }

    pub async fn update_goal(&self, goal_id: &str, updates: GoalUpdate) -> Result<Committed> {
        self.commit(|s| optimistic::update_goal(s, goal_id, updates))
            .await
    }

    pub async fn delete_goal(&self, goal_id: &str) -> Result<Committed> {
        self.commit(|s| optimistic::delete_goal(s, goal_id)).await
    }

    pub async fn add_evaluation(&self, draft: NewEvaluation) -> Result<Committed> {
        self.commit(|s| optimistic::add_evaluation(s, draft)).await
    }

    pub async fn add_skill_assessment(&self, draft: NewSkillAssessment) -> Result<Committed> {
        self.commit(|s| optimistic::add_skill_assessment(s, draft)).await
    }

    /// 以当前用户身份发布资源
    ///
    /// 非 `LINK` 类型需要上传文件，离线时直接拒绝，不进入队列。
    pub async fn add_resource(&self, draft: NewResource) -> Result<Committed> {
        if !optimistic::is_link_resource(&draft.resource_type) && !self.monitor.is_online() {
            return Err(DeepshiftSDKError::NotConnected);
        }
        let uploader = self
            .store
            .current_user()
            .ok_or_else(|| DeepshiftSDKError::InvalidArgument("发布资源前需要先设置当前用户".to_string()))?;
        let draft = NewResource {
            uploaded_by: uploader.id,
            ..draft
        };
        self.commit(|s| optimistic::add_resource(s, draft)).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Committed> {
        self.commit(|s| optimistic::mark_notification_read(s, notification_id))
            .await
    }

    pub async fn send_message(&self, draft: NewMessage) -> Result<Committed> {
        self.commit(|s| optimistic::send_message(s, draft)).await
    }

    pub async fn add_leave_request(&self, draft: NewLeaveRequest) -> Result<Committed> {
        self.commit(|s| optimistic::add_leave_request(s, draft)).await
    }

    /// 审批请假：通过 / 驳回
    pub async fn update_leave_status(&self, leave_id: &str, status: LeaveStatus) -> Result<Committed> {
        self.commit(|s| optimistic::update_leave_status(s, leave_id, status))
            .await
    }

    pub async fn add_site_visit(&self, draft: NewSiteVisit) -> Result<Committed> {
        self.commit(|s| optimistic::add_site_visit(s, draft)).await
    }

    pub async fn update_site_visit(&self, visit_id: &str, updates: SiteVisitUpdate) -> Result<Committed> {
        self.commit(|s| optimistic::update_site_visit(s, visit_id, updates))
            .await
    }

    pub async fn delete_site_visit(&self, visit_id: &str) -> Result<Committed> {
        self.commit(|s| optimistic::delete_site_visit(s, visit_id)).await
    }

    pub async fn delete_attendance_exception(&self, exception_id: &str) -> Result<Committed> {
        self.commit(|s| optimistic::delete_attendance_exception(s, exception_id))
            .await
    }

    /// 手动授予徽章；用户已拥有时返回 `None`
    pub async fn award_badge(&self, user_id: &str, badge_id: &str) -> Result<Option<Committed>> {
        self.grant_badge(user_id, badge_id).await
    }

    // ========== 同步 ==========

    /// 手动同步（重试按钮）
    #[instrument(skip(self))]
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        self.ensure_running()?;
        self.engine.run_cycle().await
    }

    /// 全量拉取远端数据替换本地快照
    ///
    /// 队列非空时先排空队列，否则未同步的本地修改会被覆盖。
    pub async fn refresh_snapshot(&self) -> Result<()> {
        self.ensure_running()?;
        if !self.monitor.is_online() {
            return Err(DeepshiftSDKError::NotConnected);
        }
        if self.engine.is_syncing() {
            debug!("同步进行中，本轮同步结束时会完成对齐");
            return Ok(());
        }
        if !self.queue.is_empty().await {
            let outcome = self.engine.run_cycle().await?;
            debug!("刷新前先排空队列: {:?}", outcome);
            return Ok(());
        }

        reconcile(&self.store, self.engine.remote().as_ref()).await?;
        self.events.emit(event_builders::snapshot_replaced()).await;
        Ok(())
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.len().await
    }

    pub async fn pending_actions(&self) -> Vec<PendingAction> {
        self.queue.pending().await
    }

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    // ========== 查询 ==========

    /// 当前快照（只复制集合指针）
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// 带评论的任务列表；两个集合都没变时复用上次的结果
    pub fn tasks_with_comments(&self) -> Arc<Vec<Task>> {
        let snapshot = self.store.snapshot();
        self.task_views
            .compose(&snapshot.tasks, &snapshot.task_comments)
    }

    // ========== 会话 ==========

    pub fn current_user(&self) -> Option<User> {
        self.store.current_user()
    }

    pub async fn set_current_user(&self, user: User) -> Result<()> {
        self.ensure_running()?;
        info!("当前用户: {} ({:?})", user.id, user.role);
        self.store.set_current_user(user).await
    }

    pub async fn clear_current_user(&self) -> Result<()> {
        self.store.clear_current_user().await
    }

    // ========== 网络 ==========

    /// 由平台层推送网络状态；返回是否产生了状态变化
    pub fn set_network_status(&self, status: NetworkStatus) -> bool {
        self.monitor.set_status(status)
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    // ========== 事件 ==========

    pub fn subscribe_events(&self) -> broadcast::Receiver<SDKEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        self.events.subscribe_filtered(filter)
    }

    pub fn event_manager(&self) -> &Arc<EventManager> {
        &self.events
    }

    // ========== 生命周期 ==========

    /// 异步关闭 SDK：停止后台任务并落盘
    pub async fn shutdown(&self) -> Result<()> {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("正在关闭 DeepshiftSDK...");

        self.monitor.stop().await;
        let tasks: Vec<_> = self.background_tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.store.teardown().await?;

        info!("DeepshiftSDK 关闭完成");
        Ok(())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// 把网络状态边沿转成 SDK 事件
fn spawn_network_events(monitor: &NetworkMonitor, events: Arc<EventManager>) -> JoinHandle<()> {
    let mut receiver = monitor.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    events
                        .emit(event_builders::network_status_changed(
                            event.old_status,
                            event.new_status,
                        ))
                        .await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("网络状态事件积压，跳过 {} 条", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_helpers::MockRemoteStore;
    use crate::storage::catalog::BADGE_PRAISED;
    use crate::storage::{
        AttendanceException, EntityKind, LogEntry, Normalize, Notification, Report, Role, SiteVisit,
        FEEDBACK_PRAISE,
    };
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        sdk: Arc<DeepshiftSDK>,
        remote: Arc<MockRemoteStore>,
        storage: Arc<MemoryStorage>,
    }

    fn test_config(sync_on_reconnect: bool) -> DeepshiftConfig {
        DeepshiftConfig::builder()
            .remote_url("http://localhost:54321")
            .sync_on_reconnect(sync_on_reconnect)
            .build()
    }

    async fn harness(status: NetworkStatus, config: DeepshiftConfig) -> Harness {
        harness_with(Arc::new(MockRemoteStore::new()), status, config).await
    }

    async fn harness_with(
        remote: Arc<MockRemoteStore>,
        status: NetworkStatus,
        config: DeepshiftConfig,
    ) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let sdk = DeepshiftSDK::initialize_with(
            config,
            storage.clone(),
            remote.clone(),
            Arc::new(NetworkMonitor::new(status)),
        )
        .await
        .unwrap();
        Harness {
            sdk,
            remote,
            storage,
        }
    }

    fn task_draft(title: &str, assignee: &str) -> NewTask {
        NewTask {
            title: title.into(),
            assigned_to_id: assignee.into(),
            assigned_by_id: "sup1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn builder_sets_sync_and_remote_fields() {
        let config = DeepshiftConfig::builder()
            .data_dir("/tmp/deepshift")
            .remote_url("https://example.test")
            .api_key("anon")
            .action_interval_ms(300)
            .event_capacity(32)
            .build();
        assert_eq!(config.data_dir.as_deref(), Some(Path::new("/tmp/deepshift")));
        assert_eq!(config.sync.action_interval_ms, 300);
        assert!(config.sync.refresh_on_start);
        assert_eq!(config.event_capacity, 32);
        assert!(DeepshiftSDK::validate_config(&config).is_ok());
        assert!(DeepshiftSDK::validate_config(&DeepshiftConfig::default()).is_err());
    }

    #[tokio::test]
    async fn offline_changes_are_queued_then_synced() {
        let h = harness(NetworkStatus::Offline, test_config(false)).await;

        let first = h.sdk.add_task(task_draft("Write API", "s1")).await.unwrap();
        let second = h.sdk.add_task(task_draft("Write tests", "s1")).await.unwrap();
        assert!(matches!(first.confirmation, Confirmation::Queued(_)));
        assert_eq!(h.sdk.pending_count().await, 2);
        assert_eq!(h.sdk.snapshot().tasks.len(), 2);
        assert_eq!(h.remote.apply_calls(), 0);

        // 本地已落盘
        assert!(h.storage.get("deepshift_tasks").await.unwrap().is_some());

        assert_eq!(
            h.sdk.sync_now().await.unwrap(),
            SyncOutcome::Skipped(crate::sync::SkipReason::Offline)
        );

        h.sdk.set_network_status(NetworkStatus::Online);
        let outcome = h.sdk.sync_now().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Reconciled { applied: 2 });
        assert_eq!(h.sdk.pending_count().await, 0);
        assert!(h.remote.row(EntityKind::Tasks, &first.entity_id).is_some());
        assert!(h.remote.row(EntityKind::Tasks, &second.entity_id).is_some());
        assert_eq!(h.sdk.snapshot().tasks.len(), 2);
    }

    #[tokio::test]
    async fn online_changes_apply_directly() {
        let h = harness(NetworkStatus::Online, test_config(false)).await;

        let committed = h.sdk.add_task(task_draft("Deploy", "s1")).await.unwrap();
        assert_eq!(committed.confirmation, Confirmation::Applied);
        assert_eq!(h.sdk.pending_count().await, 0);

        h.sdk
            .update_task_status(&committed.entity_id, TaskStatus::InProgress)
            .await
            .unwrap();
        let row = h.remote.row(EntityKind::Tasks, &committed.entity_id).unwrap();
        assert_eq!(row["status"], "IN_PROGRESS");
    }

    #[tokio::test]
    async fn praise_awards_badge_through_the_same_pipeline() {
        let h = harness(NetworkStatus::Offline, test_config(false)).await;
        let mut events = h.sdk.subscribe_filtered(
            EventFilter::new().with_event_types(vec!["badge_awarded".to_string()]),
        );

        let task = h.sdk.add_task(task_draft("Demo", "s1")).await.unwrap();
        h.sdk
            .give_feedback(&task.entity_id, FEEDBACK_PRAISE, "excellent")
            .await
            .unwrap();

        let tags: Vec<_> = h
            .sdk
            .pending_actions()
            .await
            .iter()
            .map(|p| p.type_tag())
            .collect();
        assert_eq!(tags, vec!["ADD_TASK", "GIVE_FEEDBACK", "ADD_USER_BADGE"]);

        let snapshot = h.sdk.snapshot();
        assert!(optimistic::has_badge(&snapshot, "s1", BADGE_PRAISED));
        match events.recv().await.unwrap() {
            SDKEvent::BadgeAwarded { user_id, badge_id, .. } => {
                assert_eq!(user_id, "s1");
                assert_eq!(badge_id, BADGE_PRAISED);
            }
            other => panic!("unexpected {:?}", other),
        }

        // 第二次表扬不会重复授予
        h.sdk
            .give_feedback(&task.entity_id, FEEDBACK_PRAISE, "again")
            .await
            .unwrap();
        assert_eq!(h.sdk.snapshot().user_badges.len(), 1);
        assert!(h.sdk.award_badge("s1", BADGE_PRAISED).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn comments_need_current_user_and_show_up_in_task_view() {
        let h = harness(NetworkStatus::Offline, test_config(false)).await;
        let task = h.sdk.add_task(task_draft("Review", "s1")).await.unwrap();

        assert!(matches!(
            h.sdk.add_task_comment(&task.entity_id, "hi").await,
            Err(DeepshiftSDKError::InvalidArgument(_))
        ));

        let user = User::normalize(&json!({ "id": "sup1", "name": "Ada", "role": "SUPERVISOR" }));
        h.sdk.set_current_user(user).await.unwrap();
        h.sdk.add_task_comment(&task.entity_id, "first").await.unwrap();

        let view = h.sdk.tasks_with_comments();
        assert_eq!(view[0].comments.len(), 1);
        assert_eq!(view[0].comments[0].author_id, "sup1");
        assert!(Arc::ptr_eq(&view, &h.sdk.tasks_with_comments()));
    }

    #[tokio::test]
    async fn startup_refresh_pulls_remote_rows() {
        let storage = Arc::new(MemoryStorage::new());
        let remote = Arc::new(MockRemoteStore::new());
        remote.seed(EntityKind::Goals, vec![json!({ "id": "g1", "description": "Ship v1" })]);

        let sdk = DeepshiftSDK::initialize_with(
            test_config(false),
            storage,
            remote.clone(),
            Arc::new(NetworkMonitor::new(NetworkStatus::Online)),
        )
        .await
        .unwrap();
        assert_eq!(sdk.snapshot().goals.len(), 1);
        assert_eq!(remote.select_calls(), EntityKind::ALL.len());
    }

    #[tokio::test]
    async fn reconnect_triggers_one_sync_cycle() {
        let h = harness(NetworkStatus::Offline, test_config(true)).await;
        let mut events = h.sdk.subscribe_filtered(
            EventFilter::new().with_event_types(vec!["sync_completed".to_string()]),
        );

        h.sdk
            .add_goal(NewGoal {
                student_id: "s1".into(),
                description: "Learn sled".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(h.sdk.set_network_status(NetworkStatus::Online));

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            SDKEvent::SyncCompleted { applied, failed, reconciled, .. } => {
                assert_eq!((applied, failed, reconciled), (1, 0, true));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.sdk.pending_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_rejects_further_changes() {
        let h = harness(NetworkStatus::Offline, test_config(true)).await;
        h.sdk.shutdown().await.unwrap();
        h.sdk.shutdown().await.unwrap();

        assert!(h.sdk.is_shutting_down());
        assert!(matches!(
            h.sdk.add_task(task_draft("late", "s1")).await,
            Err(DeepshiftSDKError::ShuttingDown(_))
        ));
    }

    #[tokio::test]
    async fn failed_middle_action_is_the_only_one_left() {
        let remote = Arc::new(MockRemoteStore::new());
        remote.seed(
            EntityKind::Tasks,
            vec![json!({ "id": "t1", "title": "Ship", "status": "TODO", "assigned_to_id": "s1" })],
        );
        let h = harness_with(remote, NetworkStatus::Online, test_config(false)).await;
        assert_eq!(h.sdk.snapshot().tasks.len(), 1);
        h.sdk.set_network_status(NetworkStatus::Offline);

        let log = h
            .sdk
            .add_log(NewLog {
                student_id: "s1".into(),
                date: "2024-03-01".into(),
                hours_worked: 8.0,
                activity_description: "Load testing".into(),
                challenges: Some("flaky staging".into()),
            })
            .await
            .unwrap();
        h.sdk.update_task_status("t1", TaskStatus::Completed).await.unwrap();
        let report = h
            .sdk
            .add_report(NewReport {
                student_id: "s1".into(),
                period_start: "2024-02-26".into(),
                period_end: "2024-03-01".into(),
                summary: "Week 9".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(h.sdk.pending_count().await, 3);

        let before = h.sdk.snapshot();
        let local_log = before.find::<LogEntry>(&log.entity_id).unwrap().clone();
        let local_report = before.find::<Report>(&report.entity_id).unwrap().clone();

        h.remote.fail_on("t1");
        h.sdk.set_network_status(NetworkStatus::Online);
        assert_eq!(
            h.sdk.sync_now().await.unwrap(),
            SyncOutcome::Requeued { applied: 2, failed: 1 }
        );

        let pending = h.sdk.pending_actions().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].action,
            SyncAction::UpdateTaskStatus {
                id: "t1".into(),
                status: TaskStatus::Completed
            }
        );

        // 没有对齐：本地快照保留乐观写入的记录
        let after = h.sdk.snapshot();
        assert_eq!(after.find::<LogEntry>(&log.entity_id), Some(&local_log));
        assert_eq!(after.find::<Report>(&report.entity_id), Some(&local_report));
        assert_eq!(after.find::<Task>("t1").unwrap().status, TaskStatus::Completed);

        // 远端收到的字段与本地一致；任务保持原状
        let remote_log = h.remote.row(EntityKind::Logs, &log.entity_id).unwrap();
        assert_eq!(LogEntry::normalize(&remote_log), local_log);
        let remote_report = h.remote.row(EntityKind::Reports, &report.entity_id).unwrap();
        assert_eq!(Report::normalize(&remote_report), local_report);
        assert_eq!(h.remote.row(EntityKind::Tasks, "t1").unwrap()["status"], "TODO");

        h.remote.clear_failures();
        assert_eq!(h.sdk.sync_now().await.unwrap(), SyncOutcome::Reconciled { applied: 1 });
        assert_eq!(h.remote.row(EntityKind::Tasks, "t1").unwrap()["status"], "COMPLETED");
        let reconciled = h.sdk.snapshot();
        assert_eq!(reconciled.find::<Task>("t1").unwrap().status, TaskStatus::Completed);
        assert_eq!(reconciled.find::<LogEntry>(&log.entity_id), Some(&local_log));
        assert_eq!(h.sdk.pending_count().await, 0);
    }

    #[tokio::test]
    async fn supervisor_housekeeping_reaches_the_remote() {
        let remote = Arc::new(MockRemoteStore::new());
        remote.seed(EntityKind::Goals, vec![json!({ "id": "g1", "description": "Old goal" })]);
        remote.seed(
            EntityKind::LeaveRequests,
            vec![json!({ "id": "lr1", "student_id": "s1", "status": "PENDING" })],
        );
        remote.seed(
            EntityKind::SiteVisits,
            vec![
                json!({ "id": "v1", "location": "HQ", "purpose": "Kickoff" }),
                json!({ "id": "v2", "location": "Lab" }),
            ],
        );
        remote.seed(EntityKind::Notifications, vec![json!({ "id": "n1", "read": false })]);
        remote.seed(EntityKind::AttendanceExceptions, vec![json!({ "id": "ae1" })]);
        let h = harness_with(remote, NetworkStatus::Online, test_config(false)).await;

        h.sdk.delete_goal("g1").await.unwrap();
        h.sdk.update_leave_status("lr1", LeaveStatus::Approved).await.unwrap();
        h.sdk
            .update_site_visit(
                "v1",
                SiteVisitUpdate {
                    notes: Some("Met the mentor".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        h.sdk.delete_site_visit("v2").await.unwrap();
        h.sdk.mark_notification_read("n1").await.unwrap();
        h.sdk.delete_attendance_exception("ae1").await.unwrap();
        assert_eq!(h.sdk.pending_count().await, 0);

        assert!(h.remote.rows(EntityKind::Goals).is_empty());
        assert_eq!(h.remote.row(EntityKind::LeaveRequests, "lr1").unwrap()["status"], "APPROVED");
        let visit = h.remote.row(EntityKind::SiteVisits, "v1").unwrap();
        assert_eq!(visit["notes"], "Met the mentor");
        assert_eq!(visit["location"], "HQ");
        assert!(h.remote.row(EntityKind::SiteVisits, "v2").is_none());
        assert_eq!(h.remote.row(EntityKind::Notifications, "n1").unwrap()["read"], true);
        assert!(h.remote.rows(EntityKind::AttendanceExceptions).is_empty());

        let snapshot = h.sdk.snapshot();
        assert!(snapshot.goals.is_empty());
        assert_eq!(snapshot.site_visits.len(), 1);
        assert_eq!(snapshot.find::<SiteVisit>("v1").unwrap().notes, "Met the mentor");
        assert!(snapshot.find::<Notification>("n1").unwrap().read);
        assert!(snapshot.find::<AttendanceException>("ae1").is_none());

        assert!(matches!(
            h.sdk.delete_goal("g1").await,
            Err(DeepshiftSDKError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn offline_resources_must_be_links() {
        let h = harness(NetworkStatus::Offline, test_config(false)).await;
        let draft = NewResource {
            title: "Onboarding deck".into(),
            resource_type: "PDF".into(),
            url: "https://files.example.com/deck.pdf".into(),
            ..Default::default()
        };

        assert!(matches!(
            h.sdk.add_resource(draft.clone()).await,
            Err(DeepshiftSDKError::NotConnected)
        ));
        assert!(matches!(
            h.sdk
                .add_resource(NewResource {
                    resource_type: "LINK".into(),
                    ..draft.clone()
                })
                .await,
            Err(DeepshiftSDKError::InvalidArgument(_))
        ));

        let user = User::normalize(&json!({ "id": "sup1", "role": "SUPERVISOR" }));
        h.sdk.set_current_user(user).await.unwrap();
        let committed = h
            .sdk
            .add_resource(NewResource {
                resource_type: "LINK".into(),
                ..draft
            })
            .await
            .unwrap();
        assert!(matches!(committed.confirmation, Confirmation::Queued(_)));
        assert_eq!(h.sdk.snapshot().resources[0].uploaded_by, "sup1");

        h.sdk
            .add_skill_assessment(NewSkillAssessment {
                student_id: "s1".into(),
                rater_id: "sup1".into(),
                role: Role::Supervisor,
                ratings: vec![json!({ "skillId": "s2", "score": 3 })],
                ..Default::default()
            })
            .await
            .unwrap();

        let tags: Vec<_> = h
            .sdk
            .pending_actions()
            .await
            .iter()
            .map(|p| p.type_tag())
            .collect();
        assert_eq!(tags, vec!["ADD_RESOURCE", "ADD_SKILL_ASSESSMENT"]);
        assert_eq!(h.remote.apply_calls(), 0);
    }
}
