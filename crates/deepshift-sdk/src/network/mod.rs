//! 网络状态监控
//!
//! 只转发状态边沿（离线→在线、在线→离线），重复的状态通知会被吞掉。
//! 不轮询，完全依赖平台层推送的变化事件。

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sync::SyncEngine;
use crate::utils::TimeFormatter;

/// 网络状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        self == NetworkStatus::Online
    }
}

/// 网络状态变化事件
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStatusEvent {
    pub old_status: NetworkStatus,
    pub new_status: NetworkStatus,
    pub timestamp: i64,
}

impl NetworkStatusEvent {
    /// 离线 → 在线
    pub fn is_reconnect(&self) -> bool {
        self.old_status == NetworkStatus::Offline && self.new_status == NetworkStatus::Online
    }
}

/// 网络状态监听器 trait（由平台层实现）
#[async_trait]
pub trait NetworkStatusListener: Send + Sync + std::fmt::Debug {
    /// 获取当前网络状态
    async fn get_current_status(&self) -> NetworkStatus;

    /// 开始监听网络状态变化
    async fn start_monitoring(&self) -> Result<broadcast::Receiver<NetworkStatusEvent>>;

    /// 停止监听
    async fn stop_monitoring(&self);
}

/// 网络监控管理器
#[derive(Debug)]
pub struct NetworkMonitor {
    listener: Option<Arc<dyn NetworkStatusListener>>,
    status_sender: broadcast::Sender<NetworkStatusEvent>,
    current_status: Arc<RwLock<NetworkStatus>>,
    forward_task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// 无平台监听器，由宿主通过 `set_status` 推送状态
    pub fn new(initial: NetworkStatus) -> Self {
        let (status_sender, _) = broadcast::channel(100);
        Self {
            listener: None,
            status_sender,
            current_status: Arc::new(RwLock::new(initial)),
            forward_task: Mutex::new(None),
        }
    }

    pub fn with_listener(listener: Arc<dyn NetworkStatusListener>) -> Self {
        Self {
            listener: Some(listener),
            ..Self::new(NetworkStatus::Offline)
        }
    }

    /// 启动监控：读取平台当前状态并转发后续变化
    pub async fn start(&self) -> Result<()> {
        let Some(listener) = self.listener.clone() else {
            return Ok(());
        };

        let initial = listener.get_current_status().await;
        Self::apply(&self.current_status, &self.status_sender, initial);

        let mut receiver = listener.start_monitoring().await?;
        let status_sender = self.status_sender.clone();
        let current_status = self.current_status.clone();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        Self::apply(&current_status, &status_sender, event.new_status);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("网络状态事件积压，跳过 {} 条", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("网络状态转发任务结束");
        });

        if let Some(previous) = self.forward_task.lock().replace(handle) {
            previous.abort();
        }
        info!("✅ 网络监控已启动，当前状态: {:?}", self.get_status());
        Ok(())
    }

    /// 停止监控
    pub async fn stop(&self) {
        let task = self.forward_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        if let Some(listener) = &self.listener {
            listener.stop_monitoring().await;
        }
    }

    /// 只有状态真正变化时才广播
    fn apply(
        current_status: &RwLock<NetworkStatus>,
        sender: &broadcast::Sender<NetworkStatusEvent>,
        new_status: NetworkStatus,
    ) -> bool {
        let old_status = {
            let mut status = current_status.write();
            if *status == new_status {
                return false;
            }
            std::mem::replace(&mut *status, new_status)
        };

        info!("🔄 网络状态: {:?} -> {:?}", old_status, new_status);
        let _ = sender.send(NetworkStatusEvent {
            old_status,
            new_status,
            timestamp: TimeFormatter::now_utc_millis(),
        });
        true
    }

    /// 获取当前网络状态
    pub fn get_status(&self) -> NetworkStatus {
        *self.current_status.read()
    }

    pub fn is_online(&self) -> bool {
        self.get_status().is_online()
    }

    /// 手动设置网络状态；返回是否产生了状态边沿
    pub fn set_status(&self, new_status: NetworkStatus) -> bool {
        Self::apply(&self.current_status, &self.status_sender, new_status)
    }

    /// 订阅网络状态变化
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkStatusEvent> {
        self.status_sender.subscribe()
    }
}

/// 每次离线→在线且队列非空时触发一轮同步
///
/// 不在失败后自动重试，下一次重连或手动同步再处理。
pub fn spawn_reconnect_sync(monitor: &NetworkMonitor, engine: Arc<SyncEngine>) -> JoinHandle<()> {
    let mut receiver = monitor.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) if event.is_reconnect() => {
                    if engine.queue().is_empty().await {
                        debug!("重新联网，队列为空，无需同步");
                        continue;
                    }
                    match engine.run_cycle().await {
                        Ok(outcome) => info!("重新联网后的同步结束: {:?}", outcome),
                        Err(e) => warn!("重新联网后的同步失败: {}", e),
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("网络状态事件积压，跳过 {} 条", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// 测试用：手动推送状态的网络监听器
    #[derive(Debug)]
    pub struct ManualNetworkStatusListener {
        status: RwLock<NetworkStatus>,
        sender: broadcast::Sender<NetworkStatusEvent>,
    }

    impl ManualNetworkStatusListener {
        pub fn new(initial: NetworkStatus) -> Self {
            let (sender, _) = broadcast::channel(16);
            Self {
                status: RwLock::new(initial),
                sender,
            }
        }

        /// 推送一次状态通知（可以是重复的）
        pub fn push(&self, new_status: NetworkStatus) {
            let old_status = std::mem::replace(&mut *self.status.write(), new_status);
            let _ = self.sender.send(NetworkStatusEvent {
                old_status,
                new_status,
                timestamp: TimeFormatter::now_utc_millis(),
            });
        }
    }

    #[async_trait]
    impl NetworkStatusListener for ManualNetworkStatusListener {
        async fn get_current_status(&self) -> NetworkStatus {
            *self.status.read()
        }

        async fn start_monitoring(&self) -> Result<broadcast::Receiver<NetworkStatusEvent>> {
            Ok(self.sender.subscribe())
        }

        async fn stop_monitoring(&self) {}
    }
}
