use axum::{response::Html, routing::get, Router};

const ACCESS_DENIED_PAGE: &str = "<h1>Access Denied</h1>\
    <p>You don't have permission to access this page. \
    Admin privileges are required.</p>\
    <p><a href=\"/\">Go home</a></p>";

/// GET /unauthorized - Fixed view gated HTML routes redirect to
async fn access_denied() -> Html<&'static str> {
    Html(ACCESS_DENIED_PAGE)
}

pub fn router() -> Router {
    Router::new().route("/unauthorized", get(access_denied))
}
