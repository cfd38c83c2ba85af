use shared::{
    domain::{ActivityListing, Actor, ConnectionDetail, InviteDetail, UserSummary},
    projection::{self, ActiveConnection},
};

use crate::{ApiClient, Result};

/// Everything the landing screen shows for the signed-in actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub actor: Actor,
    pub active: Vec<ActiveConnection>,
    /// Clients the actor can invite to an activity. Empty for clients.
    pub invite_targets: Vec<UserSummary>,
    pub activities: ActivityListing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestsView {
    pub incoming: Vec<ConnectionDetail>,
    pub outgoing: Vec<ConnectionDetail>,
    pub historical: Vec<ConnectionDetail>,
}

impl RequestsView {
    pub fn from_connections(connections: &[ConnectionDetail], actor: &Actor) -> Self {
        Self {
            incoming: projection::incoming_requests(connections, actor),
            outgoing: projection::outgoing_requests(connections, actor),
            historical: projection::historical_connections(connections),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitesView {
    pub pending: Vec<InviteDetail>,
    pub resolved: Vec<InviteDetail>,
}

impl InvitesView {
    pub fn from_invites(invites: &[InviteDetail]) -> Self {
        Self {
            pending: projection::pending_invites(invites),
            resolved: projection::resolved_invites(invites),
        }
    }
}

impl Dashboard {
    pub fn invites(&self) -> Option<InvitesView> {
        match &self.activities {
            ActivityListing::Invites(invites) => Some(InvitesView::from_invites(invites)),
            ActivityListing::Activities(_) => None,
        }
    }
}

pub async fn load_dashboard(client: &ApiClient) -> Result<Dashboard> {
    let actor = client.me().await?;
    let connections = client.list_connections().await?;
    let activities = client.list_activities(actor.role).await?;

    let invite_targets = if actor.is_professional() {
        projection::eligible_invite_targets(&connections)
    } else {
        Vec::new()
    };
    Ok(Dashboard {
        active: projection::active_connections(&connections, &actor),
        invite_targets,
        activities,
        actor,
    })
}

pub async fn load_requests(client: &ApiClient, actor: &Actor) -> Result<RequestsView> {
    let connections = client.list_connections().await?;
    Ok(RequestsView::from_connections(&connections, actor))
}
