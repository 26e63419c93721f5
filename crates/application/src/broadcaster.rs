use async_trait::async_trait;
use domain::ChatMessage;
use thiserror::Error;
use uuid::Uuid;

/// 一次实时投递的载荷
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageBroadcast {
    pub channel_id: Uuid,
    pub message: ChatMessage,
    /// 发起连接的标识；投递时跳过该连接
    pub origin: Option<Uuid>,
}

impl MessageBroadcast {
    pub fn chat(channel_id: Uuid, message: ChatMessage, origin: Option<Uuid>) -> Self {
        Self {
            channel_id,
            message,
            origin,
        }
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 实时广播抽象。投递是尽力而为的：持久化由消息存储负责，
/// 广播失败只影响时效，不影响正确性。
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    /// 返回实际送达的连接数
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<usize, BroadcastError>;
}
