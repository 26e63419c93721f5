mod chat_service;
mod lifecycle_service;
mod listing_service;

pub use chat_service::*;
pub use lifecycle_service::*;
pub use listing_service::*;
