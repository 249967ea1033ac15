// Query endpoint for sell order queue status
use crate::api::{empty_response, error_codes, error_response, success_response};
use crate::models::ApiResponse;
use crate::queue_estimator::{QueueSnapshot, QueueStatusService};
use std::sync::Arc;

pub struct QueueStatusQuery {
    pub service: Arc<QueueStatusService>,
}

impl QueueStatusQuery {
    pub fn new(service: Arc<QueueStatusService>) -> Self {
        Self { service }
    }

    /// Queue status for a user's active sell order.
    ///
    /// No open order and a failed read both render as the empty state;
    /// the failure is logged, the caller sees "no active order".
    pub async fn get_queue_status(&self, user_id: &str) -> ApiResponse<Option<QueueSnapshot>> {
        let uid: i64 = match user_id.parse() {
            Ok(id) => id,
            Err(_) => {
                return error_response(
                    error_codes::INVALID_USER_ID,
                    "Invalid user_id format".to_string(),
                );
            }
        };

        match self.service.snapshot_for_user(uid).await {
            Ok(Some(snapshot)) => success_response(snapshot),
            Ok(None) => empty_response(),
            Err(e) => {
                log::error!("Queue status read failed for user {}: {}", uid, e);
                empty_response()
            }
        }
    }
}
