pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod store;
pub mod test_util;
pub mod users;

pub use auth::{Authorization, Denial, Gate, GateError, Grant, IdentityProvider, JwksClient, Session};
pub use config::Config;
pub use error::ApiError;
pub use store::{MemoryUserStore, SqliteUserStore, StoreError, UserStore};
pub use users::{UserAccessor, UserError, UserQuery};

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Typed access to user records
    pub users: UserAccessor,
    /// Authorization gate over the same accessor
    pub gate: Gate,
}

impl AppState {
    /// Wire the accessor and gate around an injected store and identity provider.
    pub fn new(config: Config, store: Arc<dyn UserStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let users = UserAccessor::new(store);
        let gate = Gate::new(identity, users.clone());
        Self { config, users, gate }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match config.cors.origin_list() {
        None => AllowOrigin::from(Any),
        Some(origins) => AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health::router(state.clone()))
        .merge(routes::unauthorized::router())
        .merge(routes::users::router(state.clone()))
        .nest("/admin", routes::admin::router(state.clone()))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
}
