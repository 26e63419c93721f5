use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// 临期提醒的投递内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    /// 接收方联系方式引用（由外部账户系统解释）
    pub recipient: String,
    pub listing_title: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("dispatch failed: {0}")]
    Failed(String),
}

impl NotifyError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 对外通知投递抽象。核心对每个提醒事件只发起一次调用，
/// 失败记录日志后由下一轮巡检重试（标记仅在成功后写入）。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notice: ExpiryNotice) -> Result<(), NotifyError>;
}
