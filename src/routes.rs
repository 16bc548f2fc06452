// src/routes.rs

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::MAX_REQUEST_BYTES,
    handlers::{auth, dashboard, post, profile, tickets},
    state::AppState,
    utils::session::{admin_middleware, auth_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Public: login, logout, check-session, health.
/// * Authenticated: profile, per-user ticket lists, single ticket.
/// * Student only: create-ticket form and submission, student dashboard.
/// * Admin only: listing, stats, status changes, resolution, admin dashboard.
///
/// Role layers run after the session layer, so a missing session is always a
/// 401 and a wrong role a 403.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/check-session", get(auth::check_session))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }));

    let member_routes = Router::new()
        .route("/profile", get(profile::get_profile).post(profile::update_profile))
        .route("/api/tickets/user/{id}", get(tickets::list_user_tickets))
        .route("/api/tickets/{id}", get(tickets::get_ticket));

    let student_routes = Router::new()
        .route("/post", get(post::new_ticket_form).post(post::submit_ticket))
        .route("/student-dashboard", get(dashboard::student_dashboard))
        .route_layer(middleware::from_fn(student_middleware));

    let admin_routes = Router::new()
        .route("/api/tickets", get(tickets::list_tickets))
        .route("/api/tickets/stats", get(tickets::get_stats))
        .route("/api/tickets/filter/{category}", get(tickets::list_tickets_by_category))
        .route("/api/tickets/{id}/status", put(tickets::update_status))
        .route("/api/tickets/{id}/resolve", post(tickets::resolve_ticket))
        .route("/admin-dashboard", get(dashboard::admin_dashboard))
        .route_layer(middleware::from_fn(admin_middleware));

    // Auth first, then the role check of each group
    let protected_routes = Router::new()
        .merge(member_routes)
        .merge(student_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
