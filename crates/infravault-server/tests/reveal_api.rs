//! End-to-end tests for redacted reads, merge-rule writes and the reveal
//! endpoints, driven through the full router.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use infravault_core::crypto::{self, Envelope, SessionKey};
use infravault_core::redact::{RedactConfig, RedactionPolicy};
use infravault_core::token::CreateTokenParams;
use infravault_server::app::build_router;
use infravault_server::state::AppState;
use infravault_storage::MemoryBackend;

struct Harness {
    app: Router,
    alice: String,
    bob: String,
}

async fn harness(redact: bool) -> Harness {
    let state = Arc::new(AppState::new(
        Arc::new(MemoryBackend::new()),
        RedactionPolicy::new(RedactConfig { enabled: redact }),
    ));
    let mut tokens = Vec::new();
    for user in ["alice", "bob"] {
        let token = state
            .token_store
            .create(CreateTokenParams {
                user_id: user.to_owned(),
                display_name: user.to_owned(),
                ttl: None,
            })
            .await
            .unwrap();
        tokens.push(token);
    }
    let bob = tokens.pop().unwrap();
    let alice = tokens.pop().unwrap();
    Harness {
        app: build_router(state, 4),
        alice,
        bob,
    }
}

struct Call<'a> {
    method: Method,
    uri: String,
    token: Option<&'a str>,
    key: Option<String>,
    body: Option<Value>,
}

impl<'a> Call<'a> {
    fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            token: None,
            key: None,
            body: None,
        }
    }

    fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    fn key(mut self, key: &SessionKey) -> Self {
        self.key = Some(key.to_base64());
        self
    }

    fn raw_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_owned());
        self
    }

    fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    async fn send(self, app: &Router) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(token) = self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(key) = self.key {
            builder = builder.header("x-reveal-key", key);
        }
        let body = match self.body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

async fn create_server(h: &Harness, body: Value) -> String {
    let (status, json) = Call::new(Method::POST, "/servers")
        .token(&h.alice)
        .json(body)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_owned()
}

fn open(key: &SessionKey, reveal: &Value, field: &str) -> String {
    let envelope: Envelope = serde_json::from_value(reveal[field].clone()).unwrap();
    crypto::decrypt(key, &envelope).unwrap()
}

#[tokio::test]
async fn health_is_public_and_uncached() {
    let h = harness(true).await;
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let h = harness(true).await;
    let (status, json) = Call::new(Method::GET, "/servers").send(&h.app).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");

    let (status, _) = Call::new(Method::GET, "/servers")
        .token("ivt_forged")
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn redacted_reads_flag_present_secrets_only() {
    let h = harness(true).await;
    let id = create_server(
        &h,
        json!({ "name": "web-1", "host": "203.0.113.10", "password": "OldPass1" }),
    )
    .await;

    let (status, json) = Call::new(Method::GET, format!("/servers/{id}"))
        .token(&h.alice)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hasPassword"], true);
    assert!(json.get("password").is_none());
    assert!(json.get("sshPassword").is_none());
    assert!(json.get("hasSshPassword").is_none());

    let (_, list) = Call::new(Method::GET, "/servers")
        .token(&h.alice)
        .send(&h.app)
        .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert!(list[0].get("password").is_none());
}

#[tokio::test]
async fn unredacted_reads_include_plaintext_and_flag() {
    let h = harness(false).await;
    let id = create_server(
        &h,
        json!({ "name": "web-1", "host": "203.0.113.10", "password": "OldPass1" }),
    )
    .await;

    let (_, json) = Call::new(Method::GET, format!("/servers/{id}"))
        .token(&h.alice)
        .send(&h.app)
        .await;
    assert_eq!(json["password"], "OldPass1");
    assert_eq!(json["hasPassword"], true);
}

#[tokio::test]
async fn reveal_returns_envelopes_for_present_fields() {
    let h = harness(true).await;
    let id = create_server(
        &h,
        json!({
            "name": "db-1",
            "host": "10.0.0.5",
            "password": "OldPass1",
            "sshPassword": "root-pass"
        }),
    )
    .await;
    let key = SessionKey::generate().unwrap();

    let (status, reveal) = Call::new(Method::GET, format!("/reveal/servers/{id}"))
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open(&key, &reveal, "password"), "OldPass1");
    assert_eq!(open(&key, &reveal, "sshPassword"), "root-pass");
    assert!(reveal.get("providerPassword").is_none());
}

#[tokio::test]
async fn reveal_requires_a_valid_session_key() {
    let h = harness(true).await;
    let id = create_server(&h, json!({ "name": "a", "host": "b", "password": "p" })).await;

    let (status, json) = Call::new(Method::GET, format!("/reveal/servers/{id}"))
        .token(&h.alice)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing_reveal_key");

    for bad in ["not-base64!", "c2hvcnQ="] {
        let (status, json) = Call::new(Method::GET, format!("/reveal/servers/{id}"))
            .token(&h.alice)
            .raw_key(bad)
            .send(&h.app)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_reveal_key");
    }
}

#[tokio::test]
async fn foreign_records_are_indistinguishable_from_missing() {
    let h = harness(true).await;
    let id = create_server(&h, json!({ "name": "a", "host": "b", "password": "p" })).await;
    let key = SessionKey::generate().unwrap();
    let missing = uuid::Uuid::new_v4();

    for (foreign_uri, missing_uri) in [
        (format!("/reveal/servers/{id}"), format!("/reveal/servers/{missing}")),
        (format!("/servers/{id}"), format!("/servers/{missing}")),
    ] {
        let foreign = Call::new(Method::GET, foreign_uri)
            .token(&h.bob)
            .key(&key)
            .send(&h.app)
            .await;
        let absent = Call::new(Method::GET, missing_uri)
            .token(&h.bob)
            .key(&key)
            .send(&h.app)
            .await;
        assert_eq!(foreign.0, StatusCode::NOT_FOUND);
        assert_eq!(foreign, absent);
    }

    let (status, _) = Call::new(Method::DELETE, format!("/servers/{id}"))
        .token(&h.bob)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = Call::new(Method::GET, "/reveal/servers/not-a-uuid")
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_follows_keep_clear_replace() {
    let h = harness(true).await;
    let id = create_server(
        &h,
        json!({ "name": "web-1", "host": "203.0.113.10", "password": "OldPass1" }),
    )
    .await;
    let key = SessionKey::generate().unwrap();
    let uri = format!("/servers/{id}");
    let reveal_uri = format!("/reveal/servers/{id}");

    // Untouched field: sentinel keeps it.
    let (status, _) = Call::new(Method::PATCH, &uri)
        .token(&h.alice)
        .json(json!({ "password": "__KEEP__", "notes": "rack 4" }))
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, reveal) = Call::new(Method::GET, &reveal_uri)
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(open(&key, &reveal, "password"), "OldPass1");

    // Absent key behaves like the sentinel.
    Call::new(Method::PATCH, &uri)
        .token(&h.alice)
        .json(json!({ "host": "203.0.113.11" }))
        .send(&h.app)
        .await;
    let (_, reveal) = Call::new(Method::GET, &reveal_uri)
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(open(&key, &reveal, "password"), "OldPass1");

    // New value replaces.
    Call::new(Method::PATCH, &uri)
        .token(&h.alice)
        .json(json!({ "password": "NewPass2" }))
        .send(&h.app)
        .await;
    let (_, reveal) = Call::new(Method::GET, &reveal_uri)
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(open(&key, &reveal, "password"), "NewPass2");

    // Empty string clears: no flag, and reveal omits the field.
    let (_, json) = Call::new(Method::PATCH, &uri)
        .token(&h.alice)
        .json(json!({ "password": "" }))
        .send(&h.app)
        .await;
    assert!(json.get("hasPassword").is_none());
    let (status, reveal) = Call::new(Method::GET, &reveal_uri)
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(reveal.get("password").is_none());
}

#[tokio::test]
async fn rejected_patches_leave_record_unchanged() {
    let h = harness(true).await;
    let id = create_server(&h, json!({ "name": "web-1", "host": "h", "password": "OldPass1" })).await;
    let uri = format!("/servers/{id}");

    let cases = [
        (json!({ "name": "renamed", "password": null }), "ambiguous_secret_update"),
        (json!({ "password": 42 }), "invalid_secret_value"),
        (json!({ "password": "x".repeat(4097) }), "secret_too_long"),
        (json!({ "name": "" }), "missing_field"),
        (json!({ "passwrd": "typo" }), "bad_request"),
    ];
    for (body, code) in cases {
        let (status, json) = Call::new(Method::PATCH, &uri)
            .token(&h.alice)
            .json(body)
            .send(&h.app)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], code);
    }

    let (_, json) = Call::new(Method::GET, &uri).token(&h.alice).send(&h.app).await;
    assert_eq!(json["name"], "web-1");
    assert_eq!(json["hasPassword"], true);
}

#[tokio::test]
async fn server_can_only_link_own_provider() {
    let h = harness(true).await;
    let (_, provider) = Call::new(Method::POST, "/providers")
        .token(&h.bob)
        .json(json!({ "name": "Hetzner", "password": "console" }))
        .send(&h.app)
        .await;

    let (status, _) = Call::new(Method::POST, "/servers")
        .token(&h.alice)
        .json(json!({ "name": "a", "host": "b", "providerId": provider["id"] }))
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_reveal_and_redaction() {
    let h = harness(true).await;
    let (status, provider) = Call::new(Method::POST, "/providers")
        .token(&h.alice)
        .json(json!({ "name": "Hetzner", "username": "ops", "password": "console-pass" }))
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(provider["hasPassword"], true);
    assert!(provider.get("password").is_none());

    let key = SessionKey::generate().unwrap();
    let id = provider["id"].as_str().unwrap();
    let (_, reveal) = Call::new(Method::GET, format!("/reveal/providers/{id}"))
        .token(&h.alice)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(open(&key, &reveal, "password"), "console-pass");
}

#[tokio::test]
async fn settings_secrets_are_flagged_and_revealable() {
    let h = harness(true).await;
    let (status, settings) = Call::new(Method::PATCH, "/settings")
        .token(&h.alice)
        .json(json!({
            "whois": { "apiUrl": "https://whois.example", "apiKey": "whois-key" },
            "notifications": {
                "bark": { "enabled": true, "key": "bark-device" },
                "smtp": { "host": "smtp.example", "port": 465, "password": "smtp-pass" }
            }
        }))
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK, "{settings}");
    assert_eq!(settings["hasWhoisApiKey"], true);
    assert!(settings["whois"].get("apiKey").is_none());
    assert_eq!(settings["notifications"]["bark"]["hasKey"], true);
    assert_eq!(settings["notifications"]["smtp"]["hasPassword"], true);

    let key = SessionKey::generate().unwrap();
    for (uri, field, expected) in [
        ("/reveal/settings/key", "key", "whois-key"),
        ("/reveal/settings/bark-key", "key", "bark-device"),
        ("/reveal/settings/smtp-password", "password", "smtp-pass"),
    ] {
        let (status, reveal) = Call::new(Method::GET, uri)
            .token(&h.alice)
            .key(&key)
            .send(&h.app)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(open(&key, &reveal, field), expected);
    }

    // Bob has no settings: every reveal is empty, not an error.
    let (status, reveal) = Call::new(Method::GET, "/reveal/settings/key")
        .token(&h.bob)
        .key(&key)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reveal, json!({}));
}

#[tokio::test]
async fn old_envelopes_fail_under_a_new_session_key() {
    let h = harness(true).await;
    let id = create_server(&h, json!({ "name": "a", "host": "b", "password": "OldPass1" })).await;

    let old_key = SessionKey::generate().unwrap();
    let (_, reveal) = Call::new(Method::GET, format!("/reveal/servers/{id}"))
        .token(&h.alice)
        .key(&old_key)
        .send(&h.app)
        .await;
    let envelope: Envelope = serde_json::from_value(reveal["password"].clone()).unwrap();

    let new_key = SessionKey::generate().unwrap();
    assert!(crypto::decrypt(&new_key, &envelope).is_err());
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let h = harness(true).await;
    let (status, _) = Call::new(Method::POST, "/auth/logout")
        .token(&h.alice)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = Call::new(Method::GET, "/servers")
        .token(&h.alice)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = Call::new(Method::GET, "/servers")
        .token(&h.bob)
        .send(&h.app)
        .await;
    assert_eq!(status, StatusCode::OK);
}
