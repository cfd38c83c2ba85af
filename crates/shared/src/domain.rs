use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};

use crate::error::TransitionError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub i64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(CanonicalIdVisitor).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ConnectionId);
id_newtype!(ActivityId);
id_newtype!(InviteId);

/// Accepts ids sent as JSON numbers or as numeric strings and yields the canonical `i64`.
///
/// Upstream producers have been seen to stringify ids; normalizing here keeps every
/// comparison inside the engine a plain integer comparison.
struct CanonicalIdVisitor;

impl<'de> Visitor<'de> for CanonicalIdVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer id or a string containing one")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom(format!("id {v} is out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        v.trim()
            .parse::<i64>()
            .map_err(|_| E::custom(format!("invalid id '{v}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Professional,
    Client,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Professional => "professional",
            Role::Client => "client",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" => Ok(Role::Professional),
            "client" => Ok(Role::Client),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated party on whose behalf an engine call runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn is_professional(&self) -> bool {
        self.role == Role::Professional
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionAction {
    Accept,
    Reject,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }

    pub fn respond(self, action: ConnectionAction) -> Result<Self, TransitionError> {
        match (self, action) {
            (ConnectionStatus::Pending, ConnectionAction::Accept) => Ok(ConnectionStatus::Accepted),
            (ConnectionStatus::Pending, ConnectionAction::Reject) => Ok(ConnectionStatus::Rejected),
            (status, _) => Err(TransitionError::NotPending {
                entity: "connection",
                status: status.as_str(),
            }),
        }
    }

    pub fn check_removable(self) -> Result<(), TransitionError> {
        match self {
            ConnectionStatus::Accepted => Ok(()),
            status => Err(TransitionError::NotRemovable {
                status: status.as_str(),
            }),
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConnectionStatus::Pending),
            "accepted" => Ok(ConnectionStatus::Accepted),
            "rejected" => Ok(ConnectionStatus::Rejected),
            other => Err(format!("unknown connection status '{other}'")),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteAction {
    Accept,
    Decline,
}

impl InviteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Declined => "declined",
        }
    }

    pub fn respond(self, action: InviteAction) -> Result<Self, TransitionError> {
        match (self, action) {
            (InviteStatus::Pending, InviteAction::Accept) => Ok(InviteStatus::Accepted),
            (InviteStatus::Pending, InviteAction::Decline) => Ok(InviteStatus::Declined),
            (status, _) => Err(TransitionError::NotPending {
                entity: "invite",
                status: status.as_str(),
            }),
        }
    }
}

impl FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "declined" => Ok(InviteStatus::Declined),
            other => Err(format!("unknown invite status '{other}'")),
        }
    }
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub professional_id: UserId,
    pub client_id: UserId,
    pub status: ConnectionStatus,
    pub initiated_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, user_id: UserId) -> bool {
        self.professional_id == user_id || self.client_id == user_id
    }

    pub fn counterparty_of(&self, user_id: UserId) -> Option<UserId> {
        if self.professional_id == user_id {
            Some(self.client_id)
        } else if self.client_id == user_id {
            Some(self.professional_id)
        } else {
            None
        }
    }
}

/// A connection joined with both parties. A `None` party could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetail {
    #[serde(flatten)]
    pub connection: Connection,
    #[serde(default)]
    pub professional: Option<UserSummary>,
    #[serde(default)]
    pub client: Option<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub activity: Activity,
    #[serde(default)]
    pub creator: Option<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInvite {
    pub id: InviteId,
    pub activity_id: ActivityId,
    pub client_id: UserId,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteDetail {
    #[serde(flatten)]
    pub invite: ActivityInvite,
    pub activity: ActivityDetail,
    #[serde(default)]
    pub client: Option<UserSummary>,
}

/// Role-dispatched result of listing activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityListing {
    Activities(Vec<ActivityDetail>),
    Invites(Vec<InviteDetail>),
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
