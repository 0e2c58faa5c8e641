//! 全量拉取与快照替换
//!
//! 全部集合拉取成功才替换；任何一个失败都保留本地最近一次落盘的快照。

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::remote::RemoteStore;
use crate::storage::{EntityKind, LocalStore, Snapshot};

/// 并发拉取全部集合，组装成新快照
pub async fn fetch_snapshot(remote: &dyn RemoteStore) -> Result<Snapshot> {
    let fetches = EntityKind::ALL.iter().map(|kind| async move {
        let rows = remote.select(*kind).await?;
        Ok::<_, crate::error::DeepshiftSDKError>((*kind, Value::Array(rows)))
    });
    let tables = try_join_all(fetches).await?;
    Ok(Snapshot::from_raw(tables.iter().map(|(kind, raw)| (*kind, raw))))
}

/// 用远端数据替换本地快照；拉取失败时恢复到持久化的快照并返回错误
pub async fn reconcile(store: &LocalStore, remote: &dyn RemoteStore) -> Result<()> {
    match fetch_snapshot(remote).await {
        Ok(snapshot) => {
            store.replace(snapshot).await?;
            info!("✅ 本地快照已与远端对齐");
            Ok(())
        }
        Err(e) => {
            warn!("全量拉取失败，保留本地快照: {}", e);
            store.restore_from_durable().await?;
            Err(e)
        }
    }
}
