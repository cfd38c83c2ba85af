use shared::{
    domain::{
        Activity, ActivityDetail, ActivityId, ActivityInvite, ActivityListing, Actor, InviteAction,
        InviteDetail, InviteId, Role, UserId,
    },
    error::{ApiError, ErrorCode},
};
use storage::InviteInsert;
use tracing::{debug, info};

use crate::{deny, internal, ApiContext};

pub async fn create_activity(
    ctx: &ApiContext,
    actor: &Actor,
    title: &str,
    description: Option<&str>,
) -> Result<Activity, ApiError> {
    if !actor.is_professional() {
        return Err(deny(actor, "only professionals can create activities"));
    }
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let activity = ctx
        .storage
        .insert_activity(actor.id, title, description.unwrap_or_default())
        .await
        .map_err(internal)?;
    info!(activity_id = %activity.id, created_by = %actor.id, "activity created");
    Ok(activity)
}

/// Deletes an activity and every invite that references it.
pub async fn delete_activity(
    ctx: &ApiContext,
    actor: &Actor,
    activity_id: ActivityId,
) -> Result<(), ApiError> {
    let activity = load_activity(ctx, activity_id).await?;
    if activity.created_by != actor.id {
        return Err(deny(actor, "only the creator can delete this activity"));
    }

    let invites_removed = ctx
        .storage
        .delete_activity_cascade(activity_id, actor.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("activity not found"))?;

    info!(%activity_id, actor_id = %actor.id, invites_removed, "activity deleted");
    Ok(())
}

/// The owning professional invites a connected client to an activity.
pub async fn invite_client(
    ctx: &ApiContext,
    actor: &Actor,
    activity_id: ActivityId,
    client_id: UserId,
) -> Result<ActivityInvite, ApiError> {
    if !actor.is_professional() {
        return Err(deny(actor, "only professionals can invite to activities"));
    }
    let activity = load_activity(ctx, activity_id).await?;
    if activity.created_by != actor.id {
        return Err(deny(actor, "only the creator can invite to this activity"));
    }

    let outcome = ctx
        .storage
        .insert_invite_if_connected(activity_id, actor.id, client_id)
        .await
        .map_err(internal)?;

    match outcome {
        InviteInsert::Created(invite) => {
            info!(
                invite_id = %invite.id,
                %activity_id,
                %client_id,
                "client invited to activity"
            );
            Ok(invite)
        }
        InviteInsert::NotConnected => {
            debug!(%activity_id, %client_id, "invite refused without accepted connection");
            Err(ApiError::new(
                ErrorCode::Precondition,
                "client has no accepted connection with this professional",
            ))
        }
        InviteInsert::Duplicate => Err(ApiError::conflict(
            "client already has a pending invite to this activity",
        )),
        InviteInsert::ActivityMissing => Err(ApiError::not_found("activity not found")),
    }
}

/// The invited client accepts or declines a pending invite.
pub async fn respond_invite(
    ctx: &ApiContext,
    actor: &Actor,
    invite_id: InviteId,
    action: InviteAction,
) -> Result<ActivityInvite, ApiError> {
    let invite = load_invite(ctx, invite_id).await?;
    if invite.client_id != actor.id {
        return Err(deny(actor, "only the invited client can respond"));
    }

    let next = invite.status.respond(action)?;
    let Some(updated) = ctx
        .storage
        .resolve_pending_invite(invite_id, next)
        .await
        .map_err(internal)?
    else {
        return Err(invite_lost_race(ctx, invite_id).await);
    };

    info!(
        %invite_id,
        activity_id = %updated.activity_id,
        status = %updated.status,
        "activity invite resolved"
    );
    Ok(updated)
}

pub async fn list_for_professional(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<Vec<ActivityDetail>, ApiError> {
    if !actor.is_professional() {
        return Err(deny(actor, "only professionals own activities"));
    }
    ctx.storage
        .list_activities_for_creator(actor.id)
        .await
        .map_err(internal)
}

pub async fn list_for_client(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<Vec<InviteDetail>, ApiError> {
    if !actor.is_client() {
        return Err(deny(actor, "only clients receive activity invites"));
    }
    ctx.storage
        .list_invites_for_client(actor.id)
        .await
        .map_err(internal)
}

/// Owned activities for a professional, received invites for a client.
pub async fn list_activities(
    ctx: &ApiContext,
    actor: &Actor,
) -> Result<ActivityListing, ApiError> {
    match actor.role {
        Role::Professional => list_for_professional(ctx, actor)
            .await
            .map(ActivityListing::Activities),
        Role::Client => list_for_client(ctx, actor)
            .await
            .map(ActivityListing::Invites),
    }
}

async fn load_activity(ctx: &ApiContext, activity_id: ActivityId) -> Result<Activity, ApiError> {
    ctx.storage
        .activity(activity_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("activity not found"))
}

async fn load_invite(ctx: &ApiContext, invite_id: InviteId) -> Result<ActivityInvite, ApiError> {
    ctx.storage
        .invite(invite_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("invite not found"))
}

/// Explains why the conditional invite update matched nothing.
async fn invite_lost_race(ctx: &ApiContext, invite_id: InviteId) -> ApiError {
    match ctx.storage.invite(invite_id).await {
        Ok(Some(current)) => {
            debug!(%invite_id, status = %current.status, "invite changed concurrently");
            ApiError::new(
                ErrorCode::InvalidState,
                format!("invite is already {}", current.status),
            )
        }
        Ok(None) => ApiError::not_found("invite not found"),
        Err(err) => internal(err),
    }
}

#[cfg(test)]
#[path = "tests/activities_tests.rs"]
mod tests;
