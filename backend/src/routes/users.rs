//! User-facing routes.
//!
//! - `GET /users` lists active users
//! - `/users/:id` lets a signed-in user read and update their own record

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use warden_common::{ProfileUpdate, Role, UserPatch, UserRecord};

use super::extract::ApiJson;
use crate::error::{ApiError, Result};
use crate::AppState;

/// GET /users - Active users, most recently seen first
async fn list_active(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserRecord>>> {
    Ok(Json(state.users.list_active().await?))
}

async fn require_self(state: &AppState, headers: &HeaderMap, id: &str) -> Result<()> {
    state
        .gate
        .require_self(headers, id)
        .await
        .map(|_| ())
        .map_err(|denial| ApiError::denied(denial, Role::User))
}

/// GET /users/:id - Own record; 404 until the sign-up trigger has run
async fn get_own(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>> {
    require_self(&state, &headers, &id).await?;
    state
        .users
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PUT /users/:id - Update own full name and/or avatar
async fn update_own(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<UserRecord>> {
    require_self(&state, &headers, &id).await?;
    Ok(Json(state.users.update_profile(&id, update).await?))
}

/// PATCH /users/:id - `{"action":"update_last_seen"}`
async fn patch_own(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<Json<UserRecord>> {
    require_self(&state, &headers, &id).await?;
    let user = match patch {
        UserPatch::UpdateLastSeen => state.users.touch_last_seen(&id).await?,
    };
    Ok(Json(user))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_active))
        .route("/users/:id", get(get_own).put(update_own).patch(patch_own))
        .with_state(state)
}
