//! 应用层：编排领域模型、存储与实时广播的服务
//!
//! 三个核心服务：发布生命周期（ListingService）、会话与消息
//! （ChatService）、定时巡检（LifecycleService）。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod memory;
pub mod notifier;
pub mod repository;
pub mod services;

pub use broadcaster::*;
pub use clock::*;
pub use dto::*;
pub use error::*;
pub use notifier::*;
pub use repository::*;
pub use services::*;
