//! Layout handlers: save, read, meta.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use crate::api::auth::{AuthUser, RequirePlanner};
use crate::api::dto::{LegacyLayoutRequest, MetaResponse, is_client_shape};
use crate::app_state::AppState;
use crate::domain::{EventId, FloorPlan};
use crate::error::{ConflictResponse, ErrorResponse, GatewayError};

fn invalid(err: &serde_json::Error) -> GatewayError {
    GatewayError::Validation(err.to_string())
}

/// `POST /layouts/save/` — Save a layout.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed body, denied access, or a
/// version conflict that survived the automatic retry.
#[utoipa::path(
    post,
    path = "/layouts/save/",
    tag = "Layouts",
    summary = "Save a layout",
    description = "Accepts either a client floor plan (`eventId`, `canvasSize`, `elements`) or a versioned write (`event_id`, `version`, `canvas`, `elements`, `konva_snapshot`). Client floor plans are saved on top of the current version. A stale versioned write is retried once on the current version.",
    request_body = FloorPlan,
    responses(
        (status = 200, description = "Saved layout in client shape", body = FloorPlan),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "No caller identity", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 409, description = "Version still stale after retry", body = ConflictResponse),
    )
)]
pub async fn save_layout(
    State(state): State<AppState>,
    RequirePlanner(user): RequirePlanner,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(body) = payload.map_err(|e| GatewayError::Validation(e.body_text()))?;

    let plan = if is_client_shape(&body) {
        let plan: FloorPlan = serde_json::from_value(body).map_err(|e| invalid(&e))?;
        state.layout_service.save_floor_plan(&user, &plan).await?
    } else {
        let req: LegacyLayoutRequest = serde_json::from_value(body).map_err(|e| invalid(&e))?;
        let (event_id, write) = req.into_write();
        state
            .layout_service
            .save_legacy(&user, &event_id, write)
            .await?
    };

    Ok(Json(plan))
}

/// `GET /layouts/{event_id}/` — Read a layout in client shape.
///
/// # Errors
///
/// Returns [`GatewayError`] on an invalid id or denied access.
#[utoipa::path(
    get,
    path = "/layouts/{event_id}/",
    tag = "Layouts",
    summary = "Read a layout",
    description = "Returns the event's floor plan; an empty plan on the default canvas if none was saved yet.",
    params(("event_id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Floor plan", body = FloorPlan),
        (status = 401, description = "No caller identity", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
    )
)]
pub async fn read_layout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::parse(&event_id)?;
    let plan = state.layout_service.read(&user, &event_id).await?;
    Ok(Json(plan))
}

/// `GET /layouts/meta/{event_id}/` — Layout version and freshness.
///
/// # Errors
///
/// Returns [`GatewayError`] on an invalid id, an unknown event, or
/// denied access.
#[utoipa::path(
    get,
    path = "/layouts/meta/{event_id}/",
    tag = "Layouts",
    summary = "Layout metadata",
    description = "Cheap polling endpoint: version, last update time and whether any element exists.",
    params(("event_id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Layout metadata", body = MetaResponse),
        (status = 401, description = "No caller identity", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn layout_meta(
    State(state): State<AppState>,
    RequirePlanner(user): RequirePlanner,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_id = EventId::parse(&event_id)?;
    let meta = state.layout_service.meta(&user, &event_id).await?;
    Ok(Json(MetaResponse::new(&event_id, &meta)))
}

/// Layout routes, each with and without the trailing slash.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/layouts/save", post(save_layout))
        .route("/layouts/save/", post(save_layout))
        .route("/layouts/meta/{event_id}", get(layout_meta))
        .route("/layouts/meta/{event_id}/", get(layout_meta))
        .route("/layouts/{event_id}", get(read_layout))
        .route("/layouts/{event_id}/", get(read_layout))
}
