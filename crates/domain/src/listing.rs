//! 发布实体与生命周期状态机
//!
//! 状态流转：active -> claimed -> picked，claimed 可通过取消回到 active，
//! active/claimed 超过有效期后由调度器转为 expired。
//! expired 与 picked 为终态。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 发布状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Claimed,
    Picked,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Picked => "picked",
            Self::Expired => "expired",
        }
    }

    /// 终态不再参与任何转换
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Picked | Self::Expired)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "claimed" => Ok(Self::Claimed),
            "picked" => Ok(Self::Picked),
            "expired" => Ok(Self::Expired),
            _ => Err(DomainError::invalid_argument("status", "unknown status")),
        }
    }
}

/// 地理位置描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

/// 条件状态转换中对认领人字段的处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimantChange {
    /// 保持现值
    Keep,
    /// 设置为指定认领人
    Assign(Uuid),
    /// 清空
    Clear,
}

/// 一次原子的条件状态转换：仅当当前状态等于 expected 时才生效
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub expected: ListingStatus,
    pub next: ListingStatus,
    pub claimant: ClaimantChange,
}

impl StatusTransition {
    /// active -> claimed，写入认领人
    pub fn claim(claimant_id: Uuid) -> Self {
        Self {
            expected: ListingStatus::Active,
            next: ListingStatus::Claimed,
            claimant: ClaimantChange::Assign(claimant_id),
        }
    }

    /// claimed -> active，清空认领人
    pub fn cancel() -> Self {
        Self {
            expected: ListingStatus::Claimed,
            next: ListingStatus::Active,
            claimant: ClaimantChange::Clear,
        }
    }

    /// claimed -> picked
    pub fn pickup() -> Self {
        Self {
            expected: ListingStatus::Claimed,
            next: ListingStatus::Picked,
            claimant: ClaimantChange::Keep,
        }
    }

    /// active/claimed -> expired；从 claimed 过期时清空认领人以维持不变量
    pub fn expire_from(current: ListingStatus) -> Self {
        Self {
            expected: current,
            next: ListingStatus::Expired,
            claimant: match current {
                ListingStatus::Claimed => ClaimantChange::Clear,
                _ => ClaimantChange::Keep,
            },
        }
    }
}

/// 发布实体
///
/// 不变量：claimant_id 非空当且仅当状态为 claimed 或 picked；
/// expires_at 创建后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub holder_id: Uuid,
    /// 通知投递使用的联系方式引用（由外部账户系统提供）
    pub holder_contact: String,
    pub title: String,
    pub description: String,
    pub quantity: u32,
    pub category: String,
    pub status: ListingStatus,
    pub claimant_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    /// 临期提醒发送标记，成功投递后写入，保证至多一次通知
    pub notified_at: Option<DateTime<Utc>>,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        holder_id: Uuid,
        holder_contact: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        quantity: u32,
        category: impl Into<String>,
        expires_at: DateTime<Utc>,
        location: Location,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = Self::validate_title(title.into())?;
        let holder_contact = holder_contact.into();
        if holder_contact.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "holder_contact",
                "cannot be empty",
            ));
        }
        let category = category.into();
        if category.trim().is_empty() {
            return Err(DomainError::invalid_argument("category", "cannot be empty"));
        }
        if quantity == 0 {
            return Err(DomainError::invalid_argument(
                "quantity",
                "must be at least 1",
            ));
        }

        Ok(Self {
            id,
            holder_id,
            holder_contact,
            title,
            description: description.into(),
            quantity,
            category,
            status: ListingStatus::Active,
            claimant_id: None,
            expires_at,
            notified_at: None,
            location,
            created_at,
            updated_at: created_at,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 应用一次条件状态转换；当前状态与 expected 不一致时返回冲突错误。
    ///
    /// 存储实现负责保证整个检查-写入过程的原子性（内存实现持写锁，
    /// Postgres 实现使用条件 UPDATE）。
    pub fn apply_transition(
        &mut self,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != transition.expected {
            return Err(match transition.next {
                ListingStatus::Claimed => DomainError::AlreadyClaimed {
                    status: self.status,
                },
                _ => DomainError::NotClaimed {
                    status: self.status,
                },
            });
        }

        self.status = transition.next;
        match transition.claimant {
            ClaimantChange::Keep => {}
            ClaimantChange::Assign(claimant_id) => self.claimant_id = Some(claimant_id),
            ClaimantChange::Clear => self.claimant_id = None,
        }
        self.updated_at = now;
        Ok(())
    }

    /// 是否已过期（相对给定时刻）
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// 是否需要发送临期提醒：处于 active、尚未通知过、
    /// 且有效期落在 [now, now + window) 窗口内。
    pub fn needs_expiry_notice(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == ListingStatus::Active
            && self.notified_at.is_none()
            && self.expires_at >= now
            && self.expires_at < now + window
    }

    pub fn mark_notified(&mut self, at: DateTime<Utc>) {
        self.notified_at = Some(at);
        self.updated_at = at;
    }

    fn validate_title(title: String) -> DomainResult<String> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("title", "cannot be empty"));
        }
        if trimmed.len() > 120 {
            return Err(DomainError::invalid_argument("title", "too long"));
        }
        Ok(trimmed.to_owned())
    }
}
