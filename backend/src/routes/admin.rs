//! Admin routes.
//!
//! Provides:
//! - HTML dashboard summary (`/admin`), redirecting to `/unauthorized` on denial
//! - Admin-gated JSON API: stats, admin list, paginated user search
//! - Super-admin-gated single-user read, role/active update, and soft delete

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use warden_common::{AdminUserUpdate, DashboardStats, Role, UserPage, UserRecord};

use crate::auth::{Authorization, Grant};
use super::extract::{ApiJson, ApiQuery};
use crate::error::{ApiError, Result};
use crate::users::UserQuery;
use crate::AppState;

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;

/// Run the gate at `required` and stash the grant for the handler.
async fn gate_request(state: &AppState, required: Role, mut request: Request, next: Next) -> Response {
    match state.gate.authorize(request.headers(), required).await {
        Ok(Authorization::Granted(grant)) => {
            request.extensions_mut().insert(grant);
            next.run(request).await
        }
        Ok(Authorization::Denied(denial)) => ApiError::denied(denial, required).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Middleware that requires an admin or super admin caller.
async fn require_admin(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    gate_request(&state, Role::Admin, request, next).await
}

/// Middleware that requires a super admin caller.
async fn require_super_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    gate_request(&state, Role::SuperAdmin, request, next).await
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// GET /admin - Dashboard summary page
async fn dashboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let grant = match state.gate.require_admin(&headers).await {
        Ok(Authorization::Granted(grant)) => grant,
        Ok(Authorization::Denied(_)) => return Redirect::to("/unauthorized").into_response(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    let stats = match state.users.dashboard_stats(Utc::now()).await {
        Ok(stats) => stats,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let viewer = grant.user();
    Html(format!(
        "<h1>Admin Dashboard</h1>\
         <p>Signed in as {} ({})</p>\
         <ul>\
         <li>Total users: {}</li>\
         <li>Active users: {}</li>\
         <li>Admins: {}</li>\
         <li>New users (7 days): {}</li>\
         </ul>",
        escape_html(&viewer.email),
        viewer.role,
        stats.total_users,
        stats.active_users,
        stats.admin_users,
        stats.recent_users,
    ))
    .into_response()
}

/// GET /admin/stats - Dashboard counts (JSON API)
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.users.dashboard_stats(Utc::now()).await?))
}

/// Response for /admin/admins endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AdminsResponse {
    pub users: Vec<UserRecord>,
    pub total: usize,
}

/// GET /admin/admins - Users holding admin or super_admin
async fn list_admins(State(state): State<Arc<AppState>>) -> Result<Json<AdminsResponse>> {
    let users = state.users.list_admins().await?;
    let total = users.len();
    Ok(Json(AdminsResponse { users, total }))
}

/// Query parameters for the user listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<String>,
}

impl TryFrom<ListUsersQuery> for UserQuery {
    type Error = ApiError;

    fn try_from(query: ListUsersQuery) -> std::result::Result<Self, Self::Error> {
        let role = match query.role.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(role) => Some(
                role.parse::<Role>()
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?,
            ),
        };

        Ok(UserQuery {
            page: query.page.unwrap_or(1).max(1),
            limit: query
                .limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
            text: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            role,
        })
    }
}

/// GET /admin/users - Paginated, filtered user listing
async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Json<UserPage>> {
    let query = UserQuery::try_from(query)?;
    Ok(Json(state.users.search(query).await?))
}

/// POST /admin/users - Accounts are created by the identity provider only
async fn create_user() -> ApiError {
    ApiError::BadRequest("User creation should be done through authentication system".to_string())
}

/// GET /admin/users/:id - Single user, including soft-deleted ones
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>> {
    state
        .users
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Request body for the super admin update. Role arrives as a string so an
/// unknown value is rejected with 400 before any write.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

impl TryFrom<UpdateUserRequest> for AdminUserUpdate {
    type Error = ApiError;

    fn try_from(body: UpdateUserRequest) -> std::result::Result<Self, Self::Error> {
        let role = body
            .role
            .map(|r| r.parse::<Role>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let update = AdminUserUpdate {
            role,
            is_active: body.is_active,
        };
        if update.is_empty() {
            return Err(ApiError::BadRequest(
                "Expected at least one of role, isActive".to_string(),
            ));
        }
        Ok(update)
    }
}

/// PUT /admin/users/:id - Change role and/or active flag
async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserRecord>> {
    let update = AdminUserUpdate::try_from(body)?;
    Ok(Json(state.gate.update_user(&grant, &id, update).await?))
}

/// DELETE /admin/users/:id - Soft delete (isActive = false)
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(grant): Extension<Grant>,
    Path(id): Path<String>,
) -> Result<Json<UserRecord>> {
    Ok(Json(state.gate.deactivate_user(&grant, &id).await?))
}

/// Build the admin router.
pub fn router(state: Arc<AppState>) -> Router {
    // The HTML page runs the gate itself so it can redirect instead of 403
    let page_routes = Router::new()
        .route("/", get(dashboard))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/stats", get(stats))
        .route("/admins", get(list_admins))
        .route("/users", get(list_users).post(create_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state.clone());

    let super_admin_routes = Router::new()
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_super_admin,
        ))
        .with_state(state);

    page_routes.merge(admin_routes).merge(super_admin_routes)
}
