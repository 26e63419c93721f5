//! 会话实体
//!
//! 一个会话对应一对参与者（无序对）。参与者对在构造时即被规范化为
//! （低位, 高位）的有序形式，使 (A, B) 与 (B, A) 落在同一个键上，
//! 配合存储层的唯一约束保证同一对参与者至多存在一个会话。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 规范化的无序参与者对
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    low: Uuid,
    high: Uuid,
}

impl ParticipantPair {
    /// 规范化构造：与参数顺序无关，自身与自身不允许建立会话
    pub fn new(a: Uuid, b: Uuid) -> DomainResult<Self> {
        if a == b {
            return Err(DomainError::invalid_argument(
                "participants",
                "cannot open a channel with oneself",
            ));
        }
        Ok(Self {
            low: a.min(b),
            high: a.max(b),
        })
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, party: Uuid) -> bool {
        self.low == party || self.high == party
    }
}

/// 会话实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub pair: ParticipantPair,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn between(id: Uuid, pair: ParticipantPair, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            pair,
            created_at,
        }
    }

    pub fn involves(&self, party: Uuid) -> bool {
        self.pair.contains(party)
    }

    /// 返回给定参与者的对端；参与者不在会话中时返回 None
    pub fn counterpart_of(&self, party: Uuid) -> Option<Uuid> {
        if self.pair.low() == party {
            Some(self.pair.high())
        } else if self.pair.high() == party {
            Some(self.pair.low())
        } else {
            None
        }
    }
}
