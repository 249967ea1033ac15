use crate::models::ApiResponse;

pub mod queue_status_query;
pub mod reconcile_handler;

pub use queue_status_query::*;
pub use reconcile_handler::*;

/// Error codes
pub mod error_codes {
    pub const INVALID_USER_ID: &str = "INVALID_USER_ID";
    pub const INVALID_WALLET_ID: &str = "INVALID_WALLET_ID";
    pub const WALLET_NOT_FOUND: &str = "WALLET_NOT_FOUND";
    pub const DB_ERROR: &str = "DB_ERROR";
    pub const SYNC_CONFLICT: &str = "SYNC_CONFLICT";
}

/// Create success response
pub fn success_response<T>(data: T) -> ApiResponse<Option<T>> {
    ApiResponse::success(Some(data))
}

/// Create empty success response ("no data" is a valid terminal state,
/// not an error)
pub fn empty_response<T>() -> ApiResponse<Option<T>> {
    ApiResponse::success(None)
}

/// Create error response
pub fn error_response<T>(code: &str, message: String) -> ApiResponse<Option<T>> {
    ApiResponse::error(-1, format!("{}: {}", code, message), None)
}
