use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::{Listing, RepositoryError, StatusTransition};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::ApplicationError,
    notifier::{ExpiryNotice, NotificationDispatcher},
    repository::ListingRepository,
};

/// 一轮巡检的统计结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecyclePassSummary {
    pub scanned: usize,
    pub expired: usize,
    pub notified: usize,
    pub failed: usize,
}

enum PassOutcome {
    Expired,
    Notified,
    Unchanged,
}

pub struct LifecycleServiceDependencies {
    pub listing_repository: Arc<dyn ListingRepository>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
}

/// 发布生命周期巡检服务
///
/// 单轮扫描全部发布：过期检查先于临期提醒，因此同时满足两个条件的
/// 发布会被置为 expired 而不会收到提醒。单个发布的处理失败不会中断
/// 整轮扫描；全量读取失败（存储整体不可用）才会终止本轮。
pub struct LifecycleService {
    deps: LifecycleServiceDependencies,
    notification_window: Duration,
}

impl LifecycleService {
    pub fn new(deps: LifecycleServiceDependencies, notification_window: Duration) -> Self {
        Self {
            deps,
            notification_window,
        }
    }

    pub async fn run_pass(&self) -> Result<LifecyclePassSummary, ApplicationError> {
        let now = self.deps.clock.now();
        let listings = self.deps.listing_repository.list_all().await?;

        let mut summary = LifecyclePassSummary::default();
        for listing in listings {
            if listing.is_terminal() {
                continue;
            }
            summary.scanned += 1;

            match self.process_listing(&listing, now).await {
                Ok(PassOutcome::Expired) => summary.expired += 1,
                Ok(PassOutcome::Notified) => summary.notified += 1,
                Ok(PassOutcome::Unchanged) => {}
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        listing_id = %listing.id,
                        error = %err,
                        "lifecycle pass failed for listing, continuing"
                    );
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            expired = summary.expired,
            notified = summary.notified,
            failed = summary.failed,
            "lifecycle pass finished"
        );
        Ok(summary)
    }

    async fn process_listing(
        &self,
        listing: &Listing,
        now: DateTime<Utc>,
    ) -> Result<PassOutcome, ApplicationError> {
        // 过期判定必须先于提醒判定
        if listing.is_past_expiry(now) {
            return self.expire(listing, now).await;
        }

        if listing.needs_expiry_notice(now, self.notification_window) {
            return self.notify(listing, now).await;
        }

        Ok(PassOutcome::Unchanged)
    }

    async fn expire(
        &self,
        listing: &Listing,
        now: DateTime<Utc>,
    ) -> Result<PassOutcome, ApplicationError> {
        match self
            .deps
            .listing_repository
            .apply(listing.id, StatusTransition::expire_from(listing.status), now)
            .await
        {
            Ok(_) => Ok(PassOutcome::Expired),
            // 扫描快照之后状态被并发修改；下一轮重新评估
            Err(RepositoryError::Conflict) => Ok(PassOutcome::Unchanged),
            Err(err) => Err(err.into()),
        }
    }

    async fn notify(
        &self,
        listing: &Listing,
        now: DateTime<Utc>,
    ) -> Result<PassOutcome, ApplicationError> {
        self.deps
            .dispatcher
            .dispatch(ExpiryNotice {
                recipient: listing.holder_contact.clone(),
                listing_title: listing.title.clone(),
                expires_at: listing.expires_at,
            })
            .await?;

        // 标记仅在成功投递之后写入；已被并发标记时不算新通知
        let marked = self.mark_notified(listing.id, now).await?;
        Ok(if marked {
            PassOutcome::Notified
        } else {
            PassOutcome::Unchanged
        })
    }

    async fn mark_notified(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, ApplicationError> {
        Ok(self.deps.listing_repository.mark_notified(id, at).await?)
    }
}
