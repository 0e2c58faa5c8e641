//! KV 存储模块 - 本地持久化能力
//!
//! 本模块提供：
//! - `DurableStorage` 抽象：按逻辑键读写 JSON 值
//! - `KvStore`：基于 sled 的实现，进程重启后数据仍在
//! - `MemoryStorage`：纯内存实现，用于测试和临时会话

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sled::{Db, Tree};

use crate::error::{DeepshiftSDKError, Result};

/// 默认命名空间（sled Tree 名）
pub const DEFAULT_NAMESPACE: &str = "deepshift";

/// 持久化存储能力
#[async_trait]
pub trait DurableStorage: Send + Sync + std::fmt::Debug {
    /// 读取键；不存在时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// 覆盖写入键
    async fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// 删除键；不存在时静默成功
    async fn remove(&self, key: &str) -> Result<()>;
}

/// 基于 sled 的 KV 存储
#[derive(Debug)]
pub struct KvStore {
    base_path: PathBuf,
    db: Db,
    tree: Tree,
}

impl KvStore {
    /// 在 `{base_path}/kv` 下打开（或创建）存储，使用默认命名空间
    pub async fn open(base_path: &Path) -> Result<Self> {
        Self::open_namespace(base_path, DEFAULT_NAMESPACE).await
    }

    pub async fn open_namespace(base_path: &Path, namespace: &str) -> Result<Self> {
        let base_path = base_path.to_path_buf();
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| DeepshiftSDKError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 上一个进程可能还没释放文件锁，遇到锁冲突时带退避重试
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut db_opt: Option<Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = e.to_string();
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tracing::warn!("sled 数据库被占用，{}ms 后重试 (第 {} 次)", delay_ms, attempt + 1);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            DeepshiftSDKError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        let tree = db
            .open_tree(namespace)
            .map_err(|e| DeepshiftSDKError::KvStore(format!("打开 Tree 失败: {}", e)))?;

        tracing::info!("✅ KV 存储已打开: {:?} (namespace={})", kv_path, namespace);

        Ok(Self { base_path, db, tree })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 当前命名空间的键数量
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// 把缓冲区刷到磁盘
    pub async fn flush_async(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| DeepshiftSDKError::KvStore(format!("刷盘失败: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DurableStorage for KvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let result = self
            .tree
            .get(key)
            .map_err(|e| DeepshiftSDKError::KvStore(format!("获取键值对失败: {}", e)))?;

        match result {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    DeepshiftSDKError::Serialization(format!("反序列化值失败 ({}): {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| DeepshiftSDKError::Serialization(format!("序列化值失败: {}", e)))?;
        self.tree
            .insert(key, bytes)
            .map_err(|e| DeepshiftSDKError::KvStore(format!("设置键值对失败: {}", e)))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.tree
            .remove(key)
            .map_err(|e| DeepshiftSDKError::KvStore(format!("删除键值对失败: {}", e)))?;
        Ok(())
    }
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入（测试中用于预置持久化数据）
    pub fn with_entry(self, key: impl Into<String>, value: Value) -> Self {
        self.entries.write().insert(key.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl DurableStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_kv_store_set_get_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = KvStore::open(temp_dir.path()).await.unwrap();

        assert!(store.get("missing").await.unwrap().is_none());

        store.set("deepshift_logs", &json!([{ "id": "l1" }])).await.unwrap();
        let value = store.get("deepshift_logs").await.unwrap().unwrap();
        assert_eq!(value[0]["id"], "l1");
        assert_eq!(store.len(), 1);

        store.remove("deepshift_logs").await.unwrap();
        assert!(store.get("deepshift_logs").await.unwrap().is_none());
        store.remove("deepshift_logs").await.unwrap();
    }

    #[tokio::test]
    async fn test_kv_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = KvStore::open(temp_dir.path()).await.unwrap();
            store.set("deepshift_queue", &json!([1, 2, 3])).await.unwrap();
            store.flush_async().await.unwrap();
        }
        let store = KvStore::open(temp_dir.path()).await.unwrap();
        assert_eq!(store.get("deepshift_queue").await.unwrap(), Some(json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn test_corrupt_bytes_surface_as_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = KvStore::open(temp_dir.path()).await.unwrap();
        store.tree.insert("broken", b"{not json".to_vec()).unwrap();

        let err = store.get("broken").await.unwrap_err();
        assert!(matches!(err, DeepshiftSDKError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new().with_entry("k", json!("v"));
        assert_eq!(storage.get("k").await.unwrap(), Some(json!("v")));
        storage.set("k2", &json!(2)).await.unwrap();
        assert_eq!(storage.len(), 2);
        storage.remove("k").await.unwrap();
        assert!(storage.get("k").await.unwrap().is_none());
    }
}
