use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(middlewares::csrf::CSRF_HEADER_NAME),
        ])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint behind the admin secret
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::admin_gate::admin_gate_middleware,
            )),
        )
        .nest("/admin", admin_routes(app_state.clone()))
        .nest("/api/v1", api_routes(app_state.clone()).layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/csrf-token", get(handlers::csrf::get_csrf_token))
        .route("/pages", get(handlers::pages::list_pages))
        .route("/pages/{slug}", get(handlers::pages::get_page))
        .nest(
            "/assessments",
            assessment_routes(app_state.clone())
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware)),
        )
        .merge(form_routes(app_state))
}

fn assessment_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            post(handlers::assessments::create_assessment).layer(middleware::from_fn_with_state(
                app_state,
                middlewares::rate_limit::assessment_rate_limit_middleware,
            )),
        )
        .route("/current", get(handlers::assessments::current_assessment))
        .route(
            "/{id}",
            get(handlers::assessments::get_assessment)
                .delete(handlers::assessments::abandon_assessment),
        )
        .route("/{id}/actions", post(handlers::assessments::dispatch_action))
        .route("/{id}/report", get(handlers::assessments::get_report))
        .route("/{id}/chart.svg", get(handlers::assessments::get_chart))
        .route("/{id}/stream", get(handlers::sse::assessment_stream))
}

fn form_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/contact", post(handlers::forms::submit_contact))
        .route("/demo-request", post(handlers::forms::submit_demo_request))
        .route(
            "/certificates/validate",
            post(handlers::forms::validate_certificate),
        )
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::form_rate_limit_middleware,
        ))
}

fn admin_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/leads", get(handlers::admin::list_leads))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::admin_gate::admin_gate_middleware,
        ))
}
