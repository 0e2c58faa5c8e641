//! REST 远端存储 - PostgREST 风格的表接口
//!
//! - `GET    {base}/rest/v1/{table}?select=*`
//! - `POST   {base}/rest/v1/{table}`
//! - `PATCH  {base}/rest/v1/{table}?id=eq.{id}`
//! - `DELETE {base}/rest/v1/{table}?id=eq.{id}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info};

use super::RemoteStore;
use crate::error::{DeepshiftSDKError, Result};
use crate::sdk::HttpClientConfig;
use crate::storage::EntityKind;

const REST_PATH: &str = "rest/v1";

#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    client: Client,
    base_url: String,
}

impl RestRemoteStore {
    pub fn new(base_url: &str, api_key: &str, config: &HttpClientConfig) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(DeepshiftSDKError::Config("remote_url 不能为空".to_string()));
        }

        let mut builder = Client::builder().default_headers(auth_headers(api_key)?);
        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder
            .build()
            .map_err(|e| DeepshiftSDKError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ REST 远端已创建 (base_url: {})", base_url);
        Ok(Self { client, base_url })
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, kind.as_table())
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(DeepshiftSDKError::RemoteStatus {
            status: status.as_u16(),
            message,
        })
    }
}

fn auth_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if api_key.is_empty() {
        return Ok(headers);
    }
    let key = HeaderValue::from_str(api_key)
        .map_err(|e| DeepshiftSDKError::Config(format!("api_key 格式错误: {}", e)))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| DeepshiftSDKError::Config(format!("api_key 格式错误: {}", e)))?;
    headers.insert("apikey", key);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{}", id))]
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn select(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let request = self.client.get(self.table_url(kind)).query(&[("select", "*")]);
        let rows: Value = Self::send(request).await?.json().await?;
        match rows {
            Value::Array(rows) => {
                debug!("⬇️ {} 行 <- {}", rows.len(), kind);
                Ok(rows)
            }
            other => Err(DeepshiftSDKError::Remote(format!(
                "{} 返回了非数组结果: {}",
                kind, other
            ))),
        }
    }

    async fn insert(&self, kind: EntityKind, row: &Value) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(kind))
            .header("Prefer", "return=minimal")
            .json(row);
        Self::send(request).await?;
        Ok(())
    }

    async fn update(&self, kind: EntityKind, id: &str, patch: &Value) -> Result<()> {
        let request = self
            .client
            .patch(self.table_url(kind))
            .query(&id_filter(id))
            .header("Prefer", "return=minimal")
            .json(patch);
        Self::send(request).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let request = self.client.delete(self.table_url(kind)).query(&id_filter(id));
        Self::send(request).await?;
        Ok(())
    }
}
