// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{progress, questions, results, sessions},
    state::AppState,
    utils::jwt::{auth_middleware, identify_middleware},
};

/// Assembles the main application router.
///
/// * Every `/api` route is identified: a valid bearer token yields
///   `CurrentUser(Some(id))`, no token yields anonymous.
/// * Saving progress, resetting it and listing results require a token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let assessment_routes = Router::new()
        .route("/{kind}/{id}/questions", get(questions::list_questions))
        .route("/{kind}/{id}/progress", get(progress::get_progress))
        .route("/{kind}/{id}/sessions", post(sessions::start_session))
        .route("/submit", post(results::submit_result))
        // Protected assessment routes
        .merge(
            Router::new()
                .route("/{kind}/{id}/progress", post(progress::save_progress))
                .route("/{kind}/{id}/reset", post(progress::reset_progress))
                .layer(middleware::from_fn_with_state(config.clone(), auth_middleware)),
        );

    let session_routes = Router::new()
        .route("/{id}", get(sessions::get_session))
        .route("/{id}/answers", post(sessions::submit_answer))
        .route("/{id}/reset", post(sessions::reset_session));

    let result_routes = Router::new()
        .route("/", get(results::list_results))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    let api = Router::new()
        .nest("/assessments", assessment_routes)
        .nest("/sessions", session_routes)
        .nest("/results", result_routes)
        .layer(middleware::from_fn_with_state(config, identify_middleware));

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
