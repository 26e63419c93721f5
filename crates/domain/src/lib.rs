//! 物资共享平台核心领域模型
//!
//! 包含发布（Listing）、会话（Channel）、消息（ChatMessage）等核心实体，
//! 以及状态机转换规则和错误定义。

pub mod channel;
pub mod errors;
pub mod listing;
pub mod message;

// 重新导出常用类型
pub use channel::*;
pub use errors::*;
pub use listing::*;
pub use message::*;
