use chrono::Utc;

use super::*;
use crate::domain::{
    Activity, ActivityDetail, ActivityId, ActivityInvite, Connection, ConnectionId, InviteId,
    Role, UserId,
};

fn user(id: i64, name: &str) -> UserSummary {
    UserSummary {
        id: UserId(id),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_ascii_lowercase()),
    }
}

fn actor(id: i64, role: Role) -> Actor {
    Actor {
        id: UserId(id),
        name: format!("actor-{id}"),
        email: format!("actor-{id}@example.com"),
        role,
    }
}

fn connection(
    id: i64,
    professional: i64,
    client: i64,
    status: ConnectionStatus,
    initiated_by: i64,
) -> ConnectionDetail {
    ConnectionDetail {
        connection: Connection {
            id: ConnectionId(id),
            professional_id: UserId(professional),
            client_id: UserId(client),
            status,
            initiated_by: UserId(initiated_by),
            created_at: Utc::now(),
        },
        professional: Some(user(professional, "Pat")),
        client: Some(user(client, &format!("Client{client}"))),
    }
}

fn invite(id: i64, status: InviteStatus) -> InviteDetail {
    let activity = Activity {
        id: ActivityId(1),
        title: "Checkup".into(),
        description: String::new(),
        created_by: UserId(1),
        created_at: Utc::now(),
    };
    InviteDetail {
        invite: ActivityInvite {
            id: InviteId(id),
            activity_id: activity.id,
            client_id: UserId(2),
            status,
            created_at: Utc::now(),
        },
        activity: ActivityDetail {
            activity,
            creator: None,
        },
        client: None,
    }
}

#[test]
fn incoming_and_outgoing_split_pending_by_initiator() {
    let professional = actor(1, Role::Professional);
    let client = actor(2, Role::Client);
    let connections = vec![
        connection(10, 1, 2, ConnectionStatus::Pending, 1),
        connection(11, 1, 3, ConnectionStatus::Pending, 3),
        connection(12, 1, 4, ConnectionStatus::Accepted, 1),
    ];

    let outgoing = outgoing_requests(&connections, &professional);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].connection.id, ConnectionId(10));

    let incoming = incoming_requests(&connections, &professional);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].connection.id, ConnectionId(11));

    let client_view: Vec<_> = connections[..1].to_vec();
    assert_eq!(incoming_requests(&client_view, &client).len(), 1);
    assert!(outgoing_requests(&client_view, &client).is_empty());
}

#[test]
fn stringified_initiator_ids_still_classify_as_outgoing() {
    let professional = actor(1, Role::Professional);
    let mut value = serde_json::to_value(connection(10, 1, 2, ConnectionStatus::Pending, 1))
        .expect("json");
    value["initiated_by"] = serde_json::json!("1");
    value["id"] = serde_json::json!("10");
    let parsed: ConnectionDetail = serde_json::from_value(value).expect("parse");

    assert_eq!(outgoing_requests(&[parsed.clone()], &professional).len(), 1);
    assert!(incoming_requests(&[parsed], &professional).is_empty());
}

#[test]
fn active_connections_resolve_counterparty_by_role() {
    let connections = vec![
        connection(10, 1, 2, ConnectionStatus::Accepted, 1),
        connection(11, 1, 3, ConnectionStatus::Rejected, 1),
    ];

    let for_professional = active_connections(&connections, &actor(1, Role::Professional));
    assert_eq!(for_professional.len(), 1);
    assert_eq!(
        for_professional[0].counterparty,
        Counterparty::Known(user(2, "Client2"))
    );

    let for_client = active_connections(&connections, &actor(2, Role::Client));
    assert_eq!(
        for_client[0].counterparty,
        Counterparty::Known(user(1, "Pat"))
    );
}

#[test]
fn unresolvable_counterparty_degrades_to_placeholder() {
    let mut broken = connection(10, 1, 2, ConnectionStatus::Accepted, 1);
    broken.client = None;

    let active = active_connections(&[broken], &actor(1, Role::Professional));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].counterparty, Counterparty::Unavailable);
    assert_eq!(
        active[0].counterparty.display_name(),
        "User information unavailable"
    );
}

#[test]
fn eligible_targets_only_include_accepted_clients_once() {
    let mut unresolved = connection(13, 1, 5, ConnectionStatus::Accepted, 1);
    unresolved.client = None;
    let connections = vec![
        connection(10, 1, 2, ConnectionStatus::Accepted, 1),
        connection(11, 1, 3, ConnectionStatus::Pending, 1),
        connection(12, 1, 4, ConnectionStatus::Rejected, 4),
        connection(14, 1, 2, ConnectionStatus::Accepted, 1),
        unresolved,
    ];

    let targets = eligible_invite_targets(&connections);
    assert_eq!(targets, vec![user(2, "Client2")]);
}

#[test]
fn historical_view_keeps_rejected_only() {
    let connections = vec![
        connection(10, 1, 2, ConnectionStatus::Accepted, 1),
        connection(11, 1, 3, ConnectionStatus::Rejected, 1),
    ];
    let history = historical_connections(&connections);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].connection.id, ConnectionId(11));
}

#[test]
fn invites_partition_into_pending_and_resolved() {
    let invites = vec![
        invite(1, InviteStatus::Pending),
        invite(2, InviteStatus::Accepted),
        invite(3, InviteStatus::Declined),
    ];
    assert_eq!(pending_invites(&invites).len(), 1);
    assert_eq!(resolved_invites(&invites).len(), 2);
}

#[test]
fn counterparty_follows_party_ids_not_role() {
    let detail = connection(10, 1, 2, ConnectionStatus::Accepted, 1);

    assert_eq!(
        counterparty(&detail, &actor(2, Role::Client)),
        Counterparty::Known(user(1, "Pat"))
    );
    // A stale role on the actor must not flip which party is shown.
    assert_eq!(
        counterparty(&detail, &actor(1, Role::Client)),
        Counterparty::Known(user(2, "Client2"))
    );
    assert_eq!(
        counterparty(&detail, &actor(3, Role::Professional)),
        Counterparty::Unavailable
    );
}
