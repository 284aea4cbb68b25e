//! Caller identity
//!
//! Authentication happens upstream; the authenticated user's id arrives
//! in the `x-user-id` header and must name an active user.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::ApiState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Id of the authenticated, active caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity(pub i64);

#[axum::async_trait]
impl FromRequestParts<Arc<ApiState>> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or(ApiError::Unauthorized)?;

        let store = state.store.clone();
        let active = tokio::task::spawn_blocking(move || store.is_active_user(user_id))
            .await
            .map_err(ApiError::join)??;

        if !active {
            debug!("Rejected unknown or inactive user {}", user_id);
            return Err(ApiError::Unauthorized);
        }

        Ok(CallerIdentity(user_id))
    }
}
