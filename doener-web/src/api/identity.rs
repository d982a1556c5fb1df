//! Identity middleware
//!
//! Sessions live in the auth proxy in front of this service. The proxy
//! forwards the signed-in user's id in `x-user-id`; this middleware looks the
//! user up and attaches it to the request as [`CurrentUser`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use doener_common::db::users;
use doener_common::models::User;
use tracing::{debug, warn};

use super::ApiError;
use crate::AppState;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The signed-in user, available to handlers behind [`identity_middleware`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Owners and admins may change a record
    pub fn may_modify(&self, owner_id: &str) -> bool {
        self.0.is_admin || self.0.id == owner_id
    }

    pub fn ensure_may_modify(&self, owner_id: &str, what: &str) -> Result<(), ApiError> {
        if self.may_modify(owner_id) {
            Ok(())
        } else {
            warn!("User {} may not modify {}", self.0.id, what);
            Err(ApiError::Forbidden(format!("Not allowed to modify {}", what)))
        }
    }
}

/// Resolve `x-user-id` to a known user, else 401
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Sign-in required".to_string()))?;

    let user = users::get_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| {
            warn!("Rejected unknown user id {:?}", user_id);
            ApiError::Unauthorized("Unknown user".to_string())
        })?;

    debug!("Request by user {}", user.id);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Admin gate; must run inside [`identity_middleware`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<CurrentUser>() {
        Some(CurrentUser(user)) if user.is_admin => Ok(next.run(request).await),
        Some(CurrentUser(user)) => {
            warn!("User {} denied admin access", user.id);
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
        None => Err(ApiError::Unauthorized("Sign-in required".to_string())),
    }
}
