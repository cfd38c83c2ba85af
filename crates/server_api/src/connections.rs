use shared::{
    domain::{Actor, Connection, ConnectionAction, ConnectionDetail, ConnectionId, UserId},
    error::{ApiError, ErrorCode},
};
use tracing::{debug, info};

use crate::{deny, internal, ApiContext};

/// A professional invites a client, found by email, to connect.
pub async fn invite(
    ctx: &ApiContext,
    actor: &Actor,
    client_email: &str,
) -> Result<Connection, ApiError> {
    if !actor.is_professional() {
        return Err(deny(actor, "only professionals can invite clients"));
    }
    let email = client_email.trim();
    if email.is_empty() {
        return Err(ApiError::validation("client email is required"));
    }

    let client = ctx
        .storage
        .actor_by_email(email)
        .await
        .map_err(internal)?
        .filter(Actor::is_client)
        .ok_or_else(|| ApiError::not_found("client not found"))?;

    open_connection(ctx, actor, actor.id, client.id).await
}

/// A client asks a professional to connect.
pub async fn request_professional(
    ctx: &ApiContext,
    actor: &Actor,
    professional_id: UserId,
) -> Result<Connection, ApiError> {
    if !actor.is_client() {
        return Err(deny(actor, "only clients can request professionals"));
    }

    let professional = ctx
        .storage
        .actor_by_id(professional_id)
        .await
        .map_err(internal)?
        .filter(Actor::is_professional)
        .ok_or_else(|| ApiError::not_found("professional not found"))?;

    open_connection(ctx, actor, professional.id, actor.id).await
}

async fn open_connection(
    ctx: &ApiContext,
    initiator: &Actor,
    professional_id: UserId,
    client_id: UserId,
) -> Result<Connection, ApiError> {
    let connection = ctx
        .storage
        .insert_connection(professional_id, client_id, initiator.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            debug!(%professional_id, %client_id, "open connection already exists for pair");
            ApiError::conflict("a pending or accepted connection already exists for this pair")
        })?;

    info!(
        connection_id = %connection.id,
        %professional_id,
        %client_id,
        initiated_by = %initiator.id,
        "connection requested"
    );
    Ok(connection)
}

/// The non-initiating party accepts or rejects a pending connection.
pub async fn respond(
    ctx: &ApiContext,
    actor: &Actor,
    connection_id: ConnectionId,
    action: ConnectionAction,
) -> Result<Connection, ApiError> {
    let connection = load_connection(ctx, connection_id).await?;
    if !connection.involves(actor.id) {
        return Err(deny(actor, "not a party to this connection"));
    }
    if connection.initiated_by == actor.id {
        return Err(deny(actor, "cannot respond to your own request"));
    }

    let next = connection.status.respond(action)?;
    let Some(updated) = ctx
        .storage
        .resolve_pending_connection(connection_id, next)
        .await
        .map_err(internal)?
    else {
        return Err(lost_race(ctx, connection_id).await);
    };

    info!(
        connection_id = %updated.id,
        actor_id = %actor.id,
        status = %updated.status,
        "connection resolved"
    );
    Ok(updated)
}

/// Either party removes an accepted connection. The row is deleted outright.
pub async fn remove(
    ctx: &ApiContext,
    actor: &Actor,
    connection_id: ConnectionId,
) -> Result<(), ApiError> {
    let connection = load_connection(ctx, connection_id).await?;
    if !connection.involves(actor.id) {
        return Err(deny(actor, "not a party to this connection"));
    }
    connection.status.check_removable()?;

    let deleted = ctx
        .storage
        .delete_accepted_connection(connection_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(lost_race(ctx, connection_id).await);
    }

    info!(%connection_id, actor_id = %actor.id, "connection removed");
    Ok(())
}

/// All connections the actor is party to, oldest first, regardless of status.
pub async fn list_connections(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<Vec<ConnectionDetail>, ApiError> {
    ctx.storage
        .list_connections_for_user(actor.id)
        .await
        .map_err(internal)
}

async fn load_connection(
    ctx: &ApiContext,
    connection_id: ConnectionId,
) -> Result<Connection, ApiError> {
    ctx.storage
        .connection(connection_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("connection not found"))
}

/// Explains why a conditional write matched nothing.
async fn lost_race(ctx: &ApiContext, connection_id: ConnectionId) -> ApiError {
    match ctx.storage.connection(connection_id).await {
        Ok(Some(current)) => {
            debug!(%connection_id, status = %current.status, "connection changed concurrently");
            ApiError::new(
                ErrorCode::InvalidState,
                format!("connection is already {}", current.status),
            )
        }
        Ok(None) => ApiError::not_found("connection not found"),
        Err(err) => internal(err),
    }
}

#[cfg(test)]
#[path = "tests/connections_tests.rs"]
mod tests;
