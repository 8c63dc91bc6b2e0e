//! Router assembly

use axum::routing::{get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use warden_axum::SecurityLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // Session routes that authenticate with credentials or a refresh token
    let public_auth = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout));

    // Everything below needs a bearer token for an eligible tenant
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/auth/logout-all", post(handlers::logout_all))
        .route("/auth/switch-tenant", post(handlers::switch_tenant))
        .route("/auth/password", post(handlers::change_password))
        .route("/members", get(handlers::list_members).post(handlers::add_member))
        .route(
            "/members/{user_id}",
            patch(handlers::change_role).delete(handlers::remove_member),
        )
        .route(
            "/records/{collection}",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/records/{collection}/{id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .route_layer(SecurityLayer::new(state.auth.clone()));

    let api_v1 = public_auth.merge(protected);

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
