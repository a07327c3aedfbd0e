use http::StatusCode;
use tower::ServiceExt;

use warden_backend::app;
use warden_backend::test_util::{create_test_state, test_user};
use warden_common::Role;

async fn send_request(app: &axum::Router, method: http::Method, uri: &str, token: Option<&str>) -> StatusCode {
    let mut req_builder = http::Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        req_builder = req_builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = req_builder.body(axum::body::Body::empty()).unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    response.status()
}

async fn test_app() -> axum::Router {
    let (state, _store) = create_test_state(vec![
        test_user("regular", Role::User),
        test_user("admin", Role::Admin),
        test_user("root", Role::SuperAdmin),
    ])
    .await;
    app(state)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_active_users_list_is_public() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/users", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_users_requires_auth() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_stats_requires_auth() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/admin/stats", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_forbid_regular_users() {
    let app = test_app().await;
    for uri in ["/admin/users", "/admin/stats", "/admin/admins"] {
        let status = send_request(&app, http::Method::GET, uri, Some("regular")).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn test_admin_routes_allow_admins() {
    let app = test_app().await;
    for token in ["admin", "root"] {
        let status = send_request(&app, http::Method::GET, "/admin/users", Some(token)).await;
        assert_eq!(status, StatusCode::OK, "{token}");
    }
}

#[tokio::test]
async fn test_super_admin_routes_forbid_admins() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/admin/users/regular", Some("admin")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status = send_request(&app, http::Method::DELETE, "/admin/users/regular", Some("admin")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_signed_in_without_record_is_forbidden() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/admin/users", Some("newcomer")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dashboard_redirects_on_denial() {
    let app = test_app().await;
    for token in [None, Some("regular"), Some("newcomer")] {
        let status = send_request(&app, http::Method::GET, "/admin", token).await;
        assert_eq!(status, StatusCode::SEE_OTHER, "{token:?}");
    }

    let status = send_request(&app, http::Method::GET, "/admin", Some("admin")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unauthorized_page() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/unauthorized", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let app = test_app().await;
    let status = send_request(&app, http::Method::GET, "/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
