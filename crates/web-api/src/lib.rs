//! HTTP 与 WebSocket 接口层

pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
