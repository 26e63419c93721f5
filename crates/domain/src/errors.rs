//! 领域模型错误定义
//!
//! 区分两类错误：业务规则被违反时的领域错误（DomainError），
//! 以及存储层自身的错误（RepositoryError）。

use thiserror::Error;

use crate::listing::ListingStatus;

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 参数验证失败
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: &'static str,
    },

    /// 发布不存在
    #[error("listing not found")]
    ListingNotFound,

    /// 会话不存在
    #[error("channel not found")]
    ChannelNotFound,

    /// 认领冲突：发布不处于 active 状态，附带实际状态
    #[error("listing cannot be claimed, current status: {status}")]
    AlreadyClaimed { status: ListingStatus },

    /// 取消/取走冲突：发布不处于 claimed 状态，附带实际状态
    #[error("listing is not claimed, current status: {status}")]
    NotClaimed { status: ListingStatus },
}

impl DomainError {
    pub fn invalid_argument(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidArgument { field, reason }
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// 目标记录不存在
    #[error("record not found")]
    NotFound,

    /// 条件更新的前置状态不满足，或唯一约束冲突
    #[error("conflicting concurrent update")]
    Conflict,

    /// 存储不可用或底层故障
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
