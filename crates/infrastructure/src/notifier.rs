use async_trait::async_trait;

use application::notifier::{ExpiryNotice, NotificationDispatcher, NotifyError};

/// 将临期提醒写入结构化日志的投递实现。
/// 实际部署把邮件/短信网关接在 NotificationDispatcher 后面即可。
#[derive(Debug, Default)]
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn dispatch(&self, notice: ExpiryNotice) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notice.recipient,
            listing_title = %notice.listing_title,
            expires_at = %notice.expires_at,
            "expiry notification dispatched"
        );
        Ok(())
    }
}
