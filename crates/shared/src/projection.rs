//! Role- and direction-specific views over already fetched collections.
//!
//! Everything here is pure: the caller supplies the connections or invites it fetched
//! and the current [`Actor`], and gets back filtered, ordered views. Nothing in this
//! module fails; references that cannot be resolved surface as
//! [`Counterparty::Unavailable`] or are skipped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Actor, ConnectionDetail, ConnectionStatus, InviteDetail, InviteStatus, UserSummary,
};

/// The other party of a connection, seen from the current actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Counterparty {
    Known(UserSummary),
    Unavailable,
}

impl Counterparty {
    pub fn display_name(&self) -> &str {
        match self {
            Counterparty::Known(user) => &user.name,
            Counterparty::Unavailable => "User information unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConnection {
    pub connection: ConnectionDetail,
    pub counterparty: Counterparty,
}

/// Actors outside the connection see [`Counterparty::Unavailable`].
pub fn counterparty(connection: &ConnectionDetail, actor: &Actor) -> Counterparty {
    let Some(other) = connection.connection.counterparty_of(actor.id) else {
        return Counterparty::Unavailable;
    };
    [connection.professional.as_ref(), connection.client.as_ref()]
        .into_iter()
        .flatten()
        .find(|user| user.id == other)
        .cloned()
        .map(Counterparty::Known)
        .unwrap_or(Counterparty::Unavailable)
}

pub fn active_connections(connections: &[ConnectionDetail], actor: &Actor) -> Vec<ActiveConnection> {
    connections
        .iter()
        .filter(|c| c.connection.status == ConnectionStatus::Accepted)
        .map(|c| ActiveConnection {
            connection: c.clone(),
            counterparty: counterparty(c, actor),
        })
        .collect()
}

/// Pending requests someone else started.
pub fn incoming_requests(connections: &[ConnectionDetail], actor: &Actor) -> Vec<ConnectionDetail> {
    connections
        .iter()
        .filter(|c| {
            c.connection.status == ConnectionStatus::Pending && c.connection.initiated_by != actor.id
        })
        .cloned()
        .collect()
}

/// Pending requests the actor started.
pub fn outgoing_requests(connections: &[ConnectionDetail], actor: &Actor) -> Vec<ConnectionDetail> {
    connections
        .iter()
        .filter(|c| {
            c.connection.status == ConnectionStatus::Pending && c.connection.initiated_by == actor.id
        })
        .cloned()
        .collect()
}

pub fn historical_connections(connections: &[ConnectionDetail]) -> Vec<ConnectionDetail> {
    connections
        .iter()
        .filter(|c| c.connection.status == ConnectionStatus::Rejected)
        .cloned()
        .collect()
}

/// Clients a professional may pick when inviting to an activity.
///
/// This only narrows the selector; the activity engine re-checks the accepted
/// connection when the invite is written.
pub fn eligible_invite_targets(connections: &[ConnectionDetail]) -> Vec<UserSummary> {
    let mut seen = HashSet::new();
    connections
        .iter()
        .filter(|c| c.connection.status == ConnectionStatus::Accepted)
        .filter_map(|c| c.client.clone())
        .filter(|client| seen.insert(client.id))
        .collect()
}

pub fn pending_invites(invites: &[InviteDetail]) -> Vec<InviteDetail> {
    invites
        .iter()
        .filter(|i| i.invite.status == InviteStatus::Pending)
        .cloned()
        .collect()
}

pub fn resolved_invites(invites: &[InviteDetail]) -> Vec<InviteDetail> {
    invites
        .iter()
        .filter(|i| i.invite.status != InviteStatus::Pending)
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;
