//! Typed HTTP client for the care-connect server, plus dashboard view assembly.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{
        Activity, ActivityDetail, ActivityId, ActivityInvite, ActivityListing, Actor, Connection,
        ConnectionAction, ConnectionDetail, ConnectionId, InviteAction, InviteDetail, InviteId,
        Role, UserId, UserSummary,
    },
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        CreateActivityRequest, InviteClientRequest, InviteToActivityRequest,
        RequestProfessionalRequest, RespondConnectionRequest, RespondInviteRequest,
        UserDirectoryQuery,
    },
};
use tracing::{debug, warn};
use url::Url;

pub mod error;
pub mod views;

pub use error::{ClientError, Result};
pub use views::{load_dashboard, load_requests, Dashboard, InvitesView, RequestsView};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(server_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(server_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn healthz(&self) -> Result<()> {
        let response = self
            .http
            .get(self.base_url.join("healthz")?)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    pub async fn me(&self) -> Result<Actor> {
        self.get_json("me").await
    }

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<UserSummary>> {
        let request = self
            .authed(Method::GET, "users")?
            .query(&UserDirectoryQuery { role });
        decode(request.send().await?).await
    }

    pub async fn list_connections(&self) -> Result<Vec<ConnectionDetail>> {
        self.get_json("connections").await
    }

    pub async fn invite_client(&self, client_email: &str) -> Result<Connection> {
        self.post_json(
            "connections/invite",
            &InviteClientRequest {
                client_email: client_email.to_string(),
            },
        )
        .await
    }

    pub async fn request_professional(&self, professional_id: UserId) -> Result<Connection> {
        self.post_json(
            "connections/request",
            &RequestProfessionalRequest { professional_id },
        )
        .await
    }

    pub async fn respond_connection(
        &self,
        connection_id: ConnectionId,
        action: ConnectionAction,
    ) -> Result<Connection> {
        self.post_json(
            "connections/respond",
            &RespondConnectionRequest {
                connection_id,
                action,
            },
        )
        .await
    }

    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Result<()> {
        self.delete(&format!("connections/{connection_id}")).await
    }

    pub async fn create_activity(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Activity> {
        self.post_json(
            "activities",
            &CreateActivityRequest {
                title: title.to_string(),
                description: description.map(str::to_string),
            },
        )
        .await
    }

    pub async fn delete_activity(&self, activity_id: ActivityId) -> Result<()> {
        self.delete(&format!("activities/{activity_id}")).await
    }

    pub async fn invite_to_activity(
        &self,
        activity_id: ActivityId,
        client_id: UserId,
    ) -> Result<ActivityInvite> {
        self.post_json(
            "activities/invite",
            &InviteToActivityRequest {
                activity_id,
                client_id,
            },
        )
        .await
    }

    pub async fn respond_invite(
        &self,
        invite_id: InviteId,
        action: InviteAction,
    ) -> Result<ActivityInvite> {
        self.post_json(
            "activities/respond",
            &RespondInviteRequest { invite_id, action },
        )
        .await
    }

    /// Lists activities as the server shapes them for `role`.
    ///
    /// The payload is a bare array for both roles, so the caller's role picks the
    /// element type instead of guessing from the JSON.
    pub async fn list_activities(&self, role: Role) -> Result<ActivityListing> {
        match role {
            Role::Professional => self
                .get_json::<Vec<ActivityDetail>>("activities/list")
                .await
                .map(ActivityListing::Activities),
            Role::Client => self
                .get_json::<Vec<InviteDetail>>("activities/list")
                .await
                .map(ActivityListing::Invites),
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        let url = self.base_url.join(path)?;
        debug!(%method, %url, "api request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.authed(Method::GET, path)?.send().await?;
        decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.authed(Method::POST, path)?.json(body).send().await?;
        decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.authed(Method::DELETE, path)?.send().await?;
        check(response).await.map(|_| ())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check(response).await?;
    Ok(response.json::<T>().await?)
}

/// Turns a non-success response into an [`ApiException`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let exception = match serde_json::from_str::<ApiError>(&body) {
        Ok(err) => ApiException::new(status.as_u16(), err.code, err.message),
        Err(_) => ApiException::new(status.as_u16(), fallback_code(status), body),
    };
    warn!(status = exception.status, code = ?exception.code, message = %exception.message, "api request failed");
    Err(exception.into())
}

/// Best guess for responses that did not carry an error body, such as extractor rejections.
fn fallback_code(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthenticated,
        StatusCode::FORBIDDEN => ErrorCode::Unauthorized,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        s if s.is_client_error() => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
