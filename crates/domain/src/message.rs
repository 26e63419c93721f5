//! 消息实体
//!
//! 消息一经追加即不可变；同一会话内按创建时间非递减顺序读取。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 消息正文长度上限
const MAX_BODY_LEN: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    /// 仅作展示用途的接收者引用，不参与路由
    pub receiver_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        id: Uuid,
        channel_id: Uuid,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(DomainError::invalid_argument("body", "cannot be empty"));
        }
        if body.len() > MAX_BODY_LEN {
            return Err(DomainError::invalid_argument("body", "too long"));
        }

        Ok(Self {
            id,
            channel_id,
            sender_id,
            receiver_id,
            body,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_validation() {
        let channel_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();

        assert!(ChatMessage::new(
            Uuid::new_v4(),
            channel_id,
            sender_id,
            None,
            "hello",
            Utc::now()
        )
        .is_ok());

        assert!(ChatMessage::new(
            Uuid::new_v4(),
            channel_id,
            sender_id,
            None,
            "   ",
            Utc::now()
        )
        .is_err());

        assert!(ChatMessage::new(
            Uuid::new_v4(),
            channel_id,
            sender_id,
            None,
            "x".repeat(MAX_BODY_LEN + 1),
            Utc::now()
        )
        .is_err());
    }
}
