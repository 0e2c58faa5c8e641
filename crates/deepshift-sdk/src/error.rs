use thiserror::Error;

/// SDK 统一错误类型
///
/// 规范化（normalize）永远不会产生错误；这里只覆盖存储、远端与配置层面的失败。
#[derive(Debug, Error)]
pub enum DeepshiftSDKError {
    #[error("KV store error: {0}")]
    KvStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    IO(String),

    /// 远端存储拒绝或无法完成请求（网络错误、校验失败、认证失败等）
    #[error("Remote error: {0}")]
    Remote(String),

    /// 远端返回了非 2xx 状态码
    #[error("Remote rejected request [{status}]: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Shutting down: {0}")]
    ShuttingDown(String),
}

impl From<serde_json::Error> for DeepshiftSDKError {
    fn from(error: serde_json::Error) -> Self {
        DeepshiftSDKError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for DeepshiftSDKError {
    fn from(error: std::io::Error) -> Self {
        DeepshiftSDKError::IO(error.to_string())
    }
}

impl From<sled::Error> for DeepshiftSDKError {
    fn from(error: sled::Error) -> Self {
        DeepshiftSDKError::KvStore(error.to_string())
    }
}

impl From<reqwest::Error> for DeepshiftSDKError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => DeepshiftSDKError::RemoteStatus {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None => DeepshiftSDKError::Remote(error.to_string()),
        }
    }
}

impl DeepshiftSDKError {
    /// 是否为远端失败；不论是否为远端失败，同步时失败的动作都会重新入队
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            DeepshiftSDKError::Remote(_)
                | DeepshiftSDKError::RemoteStatus { .. }
                | DeepshiftSDKError::NotConnected
        )
    }
}

pub type Result<T> = std::result::Result<T, DeepshiftSDKError>;
