use std::sync::Arc;

use domain::{DomainError, Listing, Location, RepositoryError, StatusTransition};
use uuid::Uuid;

use crate::{clock::Clock, error::ApplicationError, repository::ListingRepository};

#[derive(Debug, Clone)]
pub struct CreateListingRequest {
    pub holder_id: Uuid,
    pub holder_contact: String,
    pub title: String,
    pub description: String,
    pub quantity: u32,
    pub category: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

pub struct ListingServiceDependencies {
    pub listing_repository: Arc<dyn ListingRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 发布生命周期服务
///
/// 认领/取消/取走都通过存储层的条件更新完成，保证同一发布上的
/// 并发操作只有一个成功；失败方拿到的错误携带实际当前状态。
pub struct ListingService {
    deps: ListingServiceDependencies,
}

impl ListingService {
    pub fn new(deps: ListingServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn create(&self, request: CreateListingRequest) -> Result<Listing, ApplicationError> {
        let now = self.deps.clock.now();
        let listing = Listing::new(
            Uuid::new_v4(),
            request.holder_id,
            request.holder_contact,
            request.title,
            request.description,
            request.quantity,
            request.category,
            request.expires_at,
            Location {
                city: request.city,
                lat: request.lat,
                lon: request.lon,
            },
            now,
        )?;

        self.deps
            .listing_repository
            .create(listing)
            .await
            .map_err(ApplicationError::from)
    }

    pub async fn get(&self, id: Uuid) -> Result<Listing, ApplicationError> {
        self.deps
            .listing_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ListingNotFound.into())
    }

    pub async fn list_all(&self) -> Result<Vec<Listing>, ApplicationError> {
        Ok(self.deps.listing_repository.list_all().await?)
    }

    pub async fn list_by_holder(&self, holder_id: Uuid) -> Result<Vec<Listing>, ApplicationError> {
        Ok(self
            .deps
            .listing_repository
            .list_by_holder(holder_id)
            .await?)
    }

    /// 认领：active -> claimed
    pub async fn claim(
        &self,
        listing_id: Uuid,
        claimant_id: Uuid,
    ) -> Result<Listing, ApplicationError> {
        self.transition(listing_id, StatusTransition::claim(claimant_id))
            .await
    }

    /// 取消认领：claimed -> active
    pub async fn cancel(&self, listing_id: Uuid) -> Result<Listing, ApplicationError> {
        self.transition(listing_id, StatusTransition::cancel()).await
    }

    /// 取走：claimed -> picked
    pub async fn pickup(&self, listing_id: Uuid) -> Result<Listing, ApplicationError> {
        self.transition(listing_id, StatusTransition::pickup()).await
    }

    async fn transition(
        &self,
        listing_id: Uuid,
        transition: StatusTransition,
    ) -> Result<Listing, ApplicationError> {
        let now = self.deps.clock.now();
        match self
            .deps
            .listing_repository
            .apply(listing_id, transition, now)
            .await
        {
            Ok(listing) => Ok(listing),
            // 条件更新落败：重新读取以便向调用方报告实际状态
            Err(RepositoryError::Conflict) => {
                let current = self.get(listing_id).await?;
                let err = match transition.next {
                    domain::ListingStatus::Claimed => DomainError::AlreadyClaimed {
                        status: current.status,
                    },
                    _ => DomainError::NotClaimed {
                        status: current.status,
                    },
                };
                Err(err.into())
            }
            Err(RepositoryError::NotFound) => Err(DomainError::ListingNotFound.into()),
            Err(err) => Err(err.into()),
        }
    }
}
