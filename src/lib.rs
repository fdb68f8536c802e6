pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod import;
pub mod middleware;
pub mod rules;
pub mod services;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::Role;
use crate::middleware::{authenticate, require_role};

pub use state::AppState;

/// Build the HTTP application
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);
    let request_logging = state.config.api.enable_request_logging;

    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .merge(admin_routes(&state))
        .with_state(state)
        .layer(cors);

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn public_routes() -> Router<AppState> {
    use handlers::public;

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/register", post(public::register))
        .route("/login", post(public::login))
}

/// Any valid token
fn protected_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected;

    Router::new()
        .route("/drives", get(protected::list_drives))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}

/// Valid token holding the admin role
fn admin_routes(state: &AppState) -> Router<AppState> {
    use handlers::elevated::{analytics, dashboard, drives, students};

    let upload_limit = DefaultBodyLimit::max(state.config.api.max_upload_bytes);

    Router::new()
        .route("/admin/dashboard", get(dashboard::dashboard))
        .route("/students", get(students::list_students).post(students::add_student))
        .route("/students/bulk", post(students::bulk_upload).layer(upload_limit))
        .route("/students/:id", put(students::update_student))
        .route("/students/:id/vaccinate", put(students::vaccinate_student))
        .route("/drives", post(drives::create_drive))
        .route("/drives/:id", put(drives::update_drive).delete(drives::delete_drive))
        .route("/analytics", get(analytics::analytics))
        // Layers run bottom-up: authenticate, then the role check
        .route_layer(from_fn_with_state(Role::Admin, require_role))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
