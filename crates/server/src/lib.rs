//! HTTP surface for the care-connect engine.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use server_api::ApiContext;
use shared::{
    domain::{
        Activity, ActivityId, ActivityInvite, ActivityListing, Actor, Connection,
        ConnectionDetail, ConnectionId, UserSummary,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        CreateActivityRequest, InviteClientRequest, InviteToActivityRequest,
        RequestProfessionalRequest, RespondConnectionRequest, RespondInviteRequest,
        UserDirectoryQuery,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::error;

pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;

pub use app_state::AppState;
use auth::{AuthConfig, CurrentActor};
use error::{into_http, HttpError};

const MAX_BODY_BYTES: usize = 64 * 1024;

impl AppState {
    pub fn new(storage: Storage, auth: AuthConfig) -> Self {
        Self {
            api: ApiContext::new(storage),
            auth,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/me", get(me))
        .route("/users", get(list_users))
        .route("/connections", get(list_connections))
        .route("/connections/invite", post(invite_client))
        .route("/connections/request", post(request_professional))
        .route("/connections/respond", post(respond_connection))
        .route("/connections/:connection_id", delete(remove_connection))
        .route("/activities", post(create_activity))
        .route("/activities/:activity_id", delete(delete_activity))
        .route("/activities/invite", post(invite_to_activity))
        .route("/activities/respond", post(respond_invite))
        .route("/activities/list", get(list_activities))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        into_http(ApiError::new(ErrorCode::Internal, "storage unavailable"))
    })?;
    Ok("ok")
}

async fn me(CurrentActor(actor): CurrentActor) -> Json<Actor> {
    Json(actor)
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Query(q): Query<UserDirectoryQuery>,
) -> Result<Json<Vec<UserSummary>>, HttpError> {
    let users = server_api::list_users(&state.api, &actor, q.role)
        .await
        .map_err(into_http)?;
    Ok(Json(users))
}

async fn list_connections(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ConnectionDetail>>, HttpError> {
    let connections = server_api::list_connections(&state.api, &actor)
        .await
        .map_err(into_http)?;
    Ok(Json(connections))
}

async fn invite_client(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<InviteClientRequest>,
) -> Result<(StatusCode, Json<Connection>), HttpError> {
    let connection = server_api::invite(&state.api, &actor, &req.client_email)
        .await
        .map_err(into_http)?;
    Ok((StatusCode::CREATED, Json(connection)))
}

async fn request_professional(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<RequestProfessionalRequest>,
) -> Result<(StatusCode, Json<Connection>), HttpError> {
    let connection = server_api::request_professional(&state.api, &actor, req.professional_id)
        .await
        .map_err(into_http)?;
    Ok((StatusCode::CREATED, Json(connection)))
}

async fn respond_connection(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<RespondConnectionRequest>,
) -> Result<Json<Connection>, HttpError> {
    let connection = server_api::respond(&state.api, &actor, req.connection_id, req.action)
        .await
        .map_err(into_http)?;
    Ok(Json(connection))
}

async fn remove_connection(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(connection_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    server_api::remove(&state.api, &actor, ConnectionId(connection_id))
        .await
        .map_err(into_http)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>), HttpError> {
    let activity =
        server_api::create_activity(&state.api, &actor, &req.title, req.description.as_deref())
            .await
            .map_err(into_http)?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(activity_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    server_api::delete_activity(&state.api, &actor, ActivityId(activity_id))
        .await
        .map_err(into_http)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn invite_to_activity(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<InviteToActivityRequest>,
) -> Result<(StatusCode, Json<ActivityInvite>), HttpError> {
    let invite = server_api::invite_client(&state.api, &actor, req.activity_id, req.client_id)
        .await
        .map_err(into_http)?;
    Ok((StatusCode::CREATED, Json(invite)))
}

async fn respond_invite(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<RespondInviteRequest>,
) -> Result<Json<ActivityInvite>, HttpError> {
    let invite = server_api::respond_invite(&state.api, &actor, req.invite_id, req.action)
        .await
        .map_err(into_http)?;
    Ok(Json(invite))
}

async fn list_activities(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<ActivityListing>, HttpError> {
    let listing = server_api::list_activities(&state.api, &actor)
        .await
        .map_err(into_http)?;
    Ok(Json(listing))
}

#[cfg(test)]
#[path = "tests/routes_tests.rs"]
mod tests;
