use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request, Response},
};
use serde::de::DeserializeOwned;
use shared::domain::{ConnectionStatus, InviteStatus, Role};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    async fn new() -> Self {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let state = Arc::new(AppState::new(
            storage,
            AuthConfig {
                secret: "route-test-secret".into(),
                ttl_seconds: 300,
            },
        ));
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    async fn user(&self, name: &str, role: Role) -> (Actor, String) {
        let actor = self
            .state
            .api
            .storage
            .create_user(name, &format!("{}@example.com", name.to_lowercase()), role)
            .await
            .expect("user");
        let token = auth::mint_token(&self.state.auth, &actor).expect("token");
        (actor, token)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }
}

async fn json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = TestApp::new().await;
    let response = app.send("GET", "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthenticated() {
    let app = TestApp::new().await;
    let response = app.send("GET", "/connections", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: ApiError = json(response).await;
    assert_eq!(err.code, ErrorCode::Unauthenticated);

    let response = app.send("GET", "/me", Some("not-a-jwt"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_the_authenticated_actor() {
    let app = TestApp::new().await;
    let (actor, token) = app.user("Pat", Role::Professional).await;
    let response = app.send("GET", "/me", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Actor = json(response).await;
    assert_eq!(me, actor);
}

#[tokio::test]
async fn user_directory_filters_by_role_and_includes_caller() {
    let app = TestApp::new().await;
    let (pat, pat_token) = app.user("Pat", Role::Professional).await;
    let (rita, _) = app.user("Rita", Role::Professional).await;
    let (cleo, _) = app.user("Cleo", Role::Client).await;

    let response = app
        .send("GET", "/users?role=professional", Some(&pat_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<UserSummary> = json(response).await;
    assert_eq!(users, vec![pat.summary(), rita.summary()]);

    let response = app.send("GET", "/users", Some(&pat_token), None).await;
    let users: Vec<UserSummary> = json(response).await;
    assert_eq!(users, vec![pat.summary(), rita.summary(), cleo.summary()]);
}

#[tokio::test]
async fn connection_lifecycle_over_http() {
    let app = TestApp::new().await;
    let (pat, pat_token) = app.user("Pat", Role::Professional).await;
    let (cleo, cleo_token) = app.user("Cleo", Role::Client).await;

    let response = app
        .send(
            "POST",
            "/connections/invite",
            Some(&pat_token),
            Some(serde_json::json!({ "client_email": "cleo@example.com" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let pending: Connection = json(response).await;
    assert_eq!(pending.initiated_by, pat.id);

    let response = app
        .send(
            "POST",
            "/connections/respond",
            Some(&pat_token),
            Some(serde_json::json!({ "connection_id": pending.id, "action": "accept" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // ids sent as strings are accepted
    let response = app
        .send(
            "POST",
            "/connections/respond",
            Some(&cleo_token),
            Some(serde_json::json!({
                "connection_id": pending.id.to_string(),
                "action": "accept",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let accepted: Connection = json(response).await;
    assert_eq!(accepted.status, ConnectionStatus::Accepted);

    let response = app
        .send(
            "POST",
            "/connections/respond",
            Some(&cleo_token),
            Some(serde_json::json!({ "connection_id": pending.id, "action": "reject" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let err: ApiError = json(response).await;
    assert_eq!(err.code, ErrorCode::InvalidState);

    let response = app.send("GET", "/connections", Some(&cleo_token), None).await;
    let listed: Vec<ConnectionDetail> = json(response).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].professional, Some(pat.summary()));
    assert_eq!(listed[0].client, Some(cleo.summary()));

    let uri = format!("/connections/{}", pending.id);
    let response = app.send("DELETE", &uri, Some(&pat_token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for token in [&pat_token, &cleo_token] {
        let response = app.send("GET", "/connections", Some(token), None).await;
        let listed: Vec<ConnectionDetail> = json(response).await;
        assert!(listed.is_empty());
    }

    let response = app.send("DELETE", &uri, Some(&pat_token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_request_is_conflict() {
    let app = TestApp::new().await;
    let (pat, _) = app.user("Pat", Role::Professional).await;
    let (_cleo, cleo_token) = app.user("Cleo", Role::Client).await;
    let body = serde_json::json!({ "professional_id": pat.id });

    let response = app
        .send("POST", "/connections/request", Some(&cleo_token), Some(body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send("POST", "/connections/request", Some(&cleo_token), Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let err: ApiError = json(response).await;
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn malformed_body_is_rejected_before_the_engine() {
    let app = TestApp::new().await;
    let (_pat, pat_token) = app.user("Pat", Role::Professional).await;
    let response = app
        .send(
            "POST",
            "/connections/respond",
            Some(&pat_token),
            Some(serde_json::json!({ "connection_id": "abc", "action": "accept" })),
        )
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn activity_lifecycle_over_http() {
    let app = TestApp::new().await;
    let (_pat, pat_token) = app.user("Pat", Role::Professional).await;
    let (cleo, cleo_token) = app.user("Cleo", Role::Client).await;

    let response = app
        .send(
            "POST",
            "/activities",
            Some(&pat_token),
            Some(serde_json::json!({ "title": "Group walk" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let activity: Activity = json(response).await;

    let invite_body = serde_json::json!({ "activity_id": activity.id, "client_id": cleo.id });
    let response = app
        .send(
            "POST",
            "/activities/invite",
            Some(&pat_token),
            Some(invite_body.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = json(response).await;
    assert_eq!(err.code, ErrorCode::Precondition);

    let response = app
        .send(
            "POST",
            "/connections/invite",
            Some(&pat_token),
            Some(serde_json::json!({ "client_email": cleo.email })),
        )
        .await;
    let pending: Connection = json(response).await;
    app.send(
        "POST",
        "/connections/respond",
        Some(&cleo_token),
        Some(serde_json::json!({ "connection_id": pending.id, "action": "accept" })),
    )
    .await;

    let response = app
        .send("POST", "/activities/invite", Some(&pat_token), Some(invite_body))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invite: ActivityInvite = json(response).await;

    let response = app.send("GET", "/activities/list", Some(&cleo_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing: ActivityListing = json(response).await;
    let ActivityListing::Invites(invites) = listing else {
        panic!("client listing should contain invites");
    };
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].activity.activity.title, "Group walk");

    let response = app
        .send(
            "POST",
            "/activities/respond",
            Some(&cleo_token),
            Some(serde_json::json!({ "invite_id": invite.id, "action": "decline" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let declined: ActivityInvite = json(response).await;
    assert_eq!(declined.status, InviteStatus::Declined);

    let response = app
        .send(
            "POST",
            "/activities/respond",
            Some(&cleo_token),
            Some(serde_json::json!({ "invite_id": invite.id, "action": "accept" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let uri = format!("/activities/{}", activity.id);
    let response = app.send("DELETE", &uri, Some(&cleo_token), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.send("DELETE", &uri, Some(&pat_token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        app.state
            .api
            .storage
            .count_invites_for_activity(activity.id)
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn clients_cannot_create_activities() {
    let app = TestApp::new().await;
    let (_cleo, cleo_token) = app.user("Cleo", Role::Client).await;
    let response = app
        .send(
            "POST",
            "/activities",
            Some(&cleo_token),
            Some(serde_json::json!({ "title": "Sneaky" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[test]
fn error_codes_map_to_statuses() {
    use crate::error::status_for;
    assert_eq!(status_for(ErrorCode::Unauthenticated), StatusCode::UNAUTHORIZED);
    assert_eq!(status_for(ErrorCode::Unauthorized), StatusCode::FORBIDDEN);
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::InvalidState), StatusCode::CONFLICT);
    assert_eq!(status_for(ErrorCode::Conflict), StatusCode::CONFLICT);
    assert_eq!(status_for(ErrorCode::Precondition), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(
        status_for(ErrorCode::Internal),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
