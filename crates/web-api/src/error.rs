use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::DomainError;

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::ListingNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "LISTING_NOT_FOUND",
                "listing not found",
            ),
            AppErr::Domain(DomainError::ChannelNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "CHANNEL_NOT_FOUND",
                "channel not found",
            ),
            // 冲突响应携带实际当前状态，便于客户端直接提示
            AppErr::Domain(DomainError::AlreadyClaimed { status }) => ApiError::new(
                StatusCode::CONFLICT,
                "ALREADY_CLAIMED",
                format!("listing cannot be claimed, current status: {}", status),
            ),
            AppErr::Domain(DomainError::NotClaimed { status }) => ApiError::new(
                StatusCode::CONFLICT,
                "NOT_CLAIMED",
                format!("listing is not claimed, current status: {}", status),
            ),
            AppErr::Repository(repo_err) => match repo_err {
                domain::RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                domain::RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "conflicting update")
                }
                domain::RepositoryError::Storage { message } => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    format!("storage error: {}", message),
                ),
            },
            AppErr::Broadcast(err) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "BROADCAST_ERROR",
                format!("broadcast error: {}", err),
            ),
            AppErr::Notify(err) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "NOTIFY_ERROR",
                format!("notification error: {}", err),
            ),
            AppErr::Infrastructure(message) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INFRASTRUCTURE_ERROR", message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
