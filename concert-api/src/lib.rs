use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod catalog;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod reservations;
pub mod state;
pub mod users;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ])
        .expose_headers([axum::http::header::AUTHORIZATION]);

    Router::new()
        .merge(catalog::routes(&state))
        .merge(users::routes(&state))
        .merge(reservations::routes(&state))
        .merge(notifications::routes(&state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
