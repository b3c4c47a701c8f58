//! REST API layer: caller identity, route handlers, DTOs, and router
//! composition.
//!
//! Layout endpoints are mounted under `/layouts`, system endpoints at the
//! root.

pub mod auth;
pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "floorplan-gateway", description = "Versioned event floor-plan layouts"),
    paths(
        handlers::layout::save_layout,
        handlers::layout::read_layout,
        handlers::layout::layout_meta,
        handlers::system::health_handler,
    ),
    components(schemas(
        crate::domain::FloorPlan,
        crate::domain::FloorPlanElement,
        crate::domain::ElementConfig,
        crate::domain::CanvasSize,
        crate::domain::Canvas,
        crate::domain::Element,
        crate::domain::Geometry,
        crate::domain::DisplayMeta,
        crate::domain::RoomBoundary,
        crate::domain::layout::Point,
        dto::LegacyLayoutRequest,
        dto::MetaResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::error::ConflictResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "Layouts", description = "Floor-plan layouts with optimistic concurrency"),
        (name = "System", description = "Health and service metadata"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Wraps [`build_router`] in the middleware stack and binds `state`.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    build_router()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
