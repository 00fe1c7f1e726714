use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use marketplace_common::WishlistResponse;

use crate::auth::cookie::extract_session_token;
use crate::error::{ApiError, Result};
use crate::AppState;

/// Resolve the caller's uid from the session credential.
fn session_uid(state: &AppState, headers: &HeaderMap) -> Result<String> {
    let token = extract_session_token(headers, &state.config.session.cookie_name)
        .ok_or_else(|| ApiError::InvalidToken("No session".to_string()))?;
    Ok(state.sessions.verify_session(&token)?.sub)
}

fn unknown_user(uid: &str) -> ApiError {
    ApiError::NotFound(format!("No user record for {uid}"))
}

fn respond(uid: String, wishlist: impl IntoIterator<Item = String>) -> Json<WishlistResponse> {
    Json(WishlistResponse {
        success: true,
        uid,
        wishlist: wishlist.into_iter().collect(),
    })
}

/// GET /api/wishlist
async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<WishlistResponse>> {
    let uid = session_uid(&state, &headers)?;
    let user = state
        .store
        .get(&uid)
        .await?
        .ok_or_else(|| unknown_user(&uid))?;
    Ok(respond(uid, user.wishlist))
}

/// POST /api/wishlist/:product_id
async fn add(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Result<Json<WishlistResponse>> {
    let uid = session_uid(&state, &headers)?;
    let wishlist = state
        .store
        .add_to_wishlist(&uid, &product_id, Utc::now())
        .await?
        .ok_or_else(|| unknown_user(&uid))?;
    tracing::debug!(uid = %uid, product_id = %product_id, "Added to wishlist");
    Ok(respond(uid, wishlist))
}

/// DELETE /api/wishlist/:product_id
async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Result<Json<WishlistResponse>> {
    let uid = session_uid(&state, &headers)?;
    let wishlist = state
        .store
        .remove_from_wishlist(&uid, &product_id, Utc::now())
        .await?
        .ok_or_else(|| unknown_user(&uid))?;
    tracing::debug!(uid = %uid, product_id = %product_id, "Removed from wishlist");
    Ok(respond(uid, wishlist))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/wishlist", get(list))
        .route("/api/wishlist/:product_id", post(add).delete(remove))
        .with_state(state)
}
