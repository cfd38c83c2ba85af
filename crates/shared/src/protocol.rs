use serde::{Deserialize, Serialize};

use crate::domain::{ActivityId, ConnectionAction, ConnectionId, InviteAction, InviteId, Role, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteClientRequest {
    pub client_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestProfessionalRequest {
    pub professional_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondConnectionRequest {
    pub connection_id: ConnectionId,
    pub action: ConnectionAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivityRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteToActivityRequest {
    pub activity_id: ActivityId,
    pub client_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondInviteRequest {
    pub invite_id: InviteId,
    pub action: InviteAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDirectoryQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}
