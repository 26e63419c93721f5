//! 生命周期巡检驱动
//!
//! 独立于请求处理的周期性任务。巡检在单个任务内顺序执行，
//! 上一轮未结束时下一轮不会开始（MissedTickBehavior::Delay 保证
//! 迟到的 tick 顺延而不是补发），避免同一批发布被并发处理。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use application::LifecycleService;

pub struct LifecycleScheduler {
    service: Arc<LifecycleService>,
    period: Duration,
}

impl LifecycleScheduler {
    pub fn new(service: Arc<LifecycleService>, period: Duration) -> Self {
        Self { service, period }
    }

    /// 启动巡检循环；首轮在启动时立即执行
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if let Err(err) = self.service.run_pass().await {
                    tracing::error!(error = %err, "lifecycle pass aborted");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::memory::InMemoryListingRepository;
    use crate::notifier::LoggingNotificationDispatcher;
    use application::repository::ListingRepository;
    use application::{LifecycleServiceDependencies, SystemClock};
    use chrono::Utc;
    use domain::{Listing, ListingStatus, Location};
    use uuid::Uuid;

    #[tokio::test]
    async fn scheduler_expires_listings_in_background() {
        let repo = Arc::new(InMemoryListingRepository::new());
        let listing = Listing::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "holder@example.com",
            "Leftover fruit",
            "",
            1,
            "produce",
            Utc::now() - chrono::Duration::hours(1),
            Location {
                city: "Pune".to_string(),
                lat: 18.52,
                lon: 73.86,
            },
            Utc::now() - chrono::Duration::days(1),
        )
        .unwrap();
        let id = listing.id;
        repo.create(listing).await.unwrap();

        let service = Arc::new(LifecycleService::new(
            LifecycleServiceDependencies {
                listing_repository: repo.clone(),
                dispatcher: Arc::new(LoggingNotificationDispatcher),
                clock: Arc::new(SystemClock),
            },
            chrono::Duration::hours(24),
        ));

        let handle = LifecycleScheduler::new(service, Duration::from_millis(10)).spawn();
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ListingStatus::Expired);
    }
}
