//! Relationship and invitation lifecycle engine.
//!
//! Every operation takes the acting [`Actor`] explicitly and returns either the
//! updated entity or an [`ApiError`] whose code names the failed rule. Preconditions
//! that must hold at write time are re-checked by the storage layer's conditional
//! writes, so a lost race surfaces as `InvalidState`, `Conflict` or `NotFound`
//! rather than as a duplicate or inconsistent row.

use shared::{
    domain::{Actor, Role, UserSummary},
    error::{ApiError, ErrorCode},
};
use storage::Storage;
use tracing::{debug, error, warn};

pub mod activities;
pub mod connections;

pub use activities::{
    create_activity, delete_activity, invite_client, list_activities, list_for_client,
    list_for_professional, respond_invite,
};
pub use connections::{invite, list_connections, remove, request_professional, respond};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

/// Directory of users, optionally narrowed to one role. Any authenticated actor may read
/// it, and the caller is listed like everyone else.
pub async fn list_users(
    ctx: &ApiContext,
    actor: &Actor,
    role: Option<Role>,
) -> Result<Vec<UserSummary>, ApiError> {
    let users = ctx.storage.list_users(role).await.map_err(internal)?;
    debug!(actor_id = %actor.id, ?role, count = users.len(), "directory listed");
    Ok(users)
}

fn deny(actor: &Actor, message: &str) -> ApiError {
    warn!(actor_id = %actor.id, role = %actor.role, reason = message, "request denied");
    ApiError::unauthorized(message)
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "storage failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}
