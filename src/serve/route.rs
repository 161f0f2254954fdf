use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};

use super::{handlers::*, state::AppState};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let assets_dir = app_state.env.assets_dir.clone();

    Router::new()
        .route("/", get(home_handler).post(home_post_handler))
        .route("/register", get(register_page).post(register_handler))
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", get(logout_page).post(logout_handler))
        .route("/health", get(health_handler))
        .nest_service("/styles", ServeDir::new(assets_dir.join("styles")))
        .nest_service("/pkg", ServeDir::new(assets_dir.join("pkg")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(Extension(app_state))
}
