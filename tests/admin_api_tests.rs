//! HTTP-level tests for the RGW admin ops user backend.
//!
//! A wiremock server stands in for the gateway; these verify the request
//! shapes (method, path, query, SigV4 headers), the NotFound mapping, the
//! error taxonomy, and the revoke-then-update sequence.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rgwible::client::admin::{KeyPair, UserBackend, UserState};
use rgwible::client::{AdminBackend, ClientError, ConnectionInfo};
use rgwible::reconcile::{reconcile, Desired, ReconcileOptions};

fn conn_for(server: &MockServer) -> ConnectionInfo {
    let addr = server.address();
    ConnectionInfo {
        host: addr.ip().to_string(),
        port: Some(addr.port()),
        use_ssl: false,
        verify_ssl: false,
        access_key: "ADMINAK".to_string(),
        secret_key: "ADMINSK".to_string(),
        region: None,
    }
}

fn alice_body() -> serde_json::Value {
    json!({
        "user_id": "alice",
        "tenant": "",
        "display_name": "Alice",
        "email": "",
        "max_buckets": 1000,
        "suspended": 0,
        "keys": [{"user": "alice", "access_key": "OLDAK", "secret_key": "OLDSK"}],
        "caps": [],
        "subusers": [],
        "swift_keys": []
    })
}

fn desired_alice() -> UserState {
    UserState {
        user_id: "alice".to_string(),
        tenant: None,
        display_name: Some("Alice".to_string()),
        email: None,
        max_buckets: Some(1000),
        suspended: None,
        keys: None,
        caps: None,
    }
}

#[tokio::test]
async fn test_fetch_existing_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/user"))
        .and(query_param("uid", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_body()))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "alice").unwrap();
    let state = backend.fetch().await.unwrap().expect("user exists");

    assert_eq!(state.user_id, "alice");
    assert_eq!(state.display_name, Some("Alice".to_string()));
    // empty strings from the wire are normalized away
    assert_eq!(state.tenant, None);
    assert_eq!(state.email, None);
    assert_eq!(state.keys.as_ref().unwrap().access_key, "OLDAK");
}

#[tokio::test]
async fn test_fetch_missing_user_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/user"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"Code": "NoSuchUser"})))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "ghost").unwrap();
    assert!(backend.fetch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_server_error_is_domain_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/user"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"Code": "InternalError"})))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "alice").unwrap();
    match backend.fetch().await {
        Err(ClientError::Domain { code, .. }) => assert_eq!(code, "InternalError"),
        other => panic!("expected domain error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Nothing is listening on this port once the server is dropped.
    let server = MockServer::start().await;
    let conn = conn_for(&server);
    drop(server);

    let backend = UserBackend::new(&conn, "alice").unwrap();
    assert!(matches!(
        backend.fetch().await,
        Err(ClientError::Transport(_))
    ));
}

#[tokio::test]
async fn test_create_sends_signed_put_with_uid() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/admin/user"))
        .and(query_param("uid", "t1$alice"))
        .and(query_param("display-name", "Alice"))
        .and(query_param("generate-key", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_body()))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "t1$alice").unwrap();
    let created = backend.create(&desired_alice()).await.unwrap();

    // generated credentials are echoed back
    assert_eq!(created.unwrap().keys.unwrap().access_key, "OLDAK");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let auth = requests[0]
        .headers
        .get("authorization")
        .expect("request must be signed");
    assert!(auth.to_str().unwrap().starts_with("AWS4-HMAC-SHA256"));
    assert!(requests[0].headers.contains_key("x-amz-date"));
    assert!(requests[0].headers.contains_key("x-amz-content-sha256"));
}

#[tokio::test]
async fn test_uid_used_on_every_call() {
    let server = MockServer::start().await;
    Mock::given(path("/admin/user"))
        .and(query_param("uid", "t1$alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_body()))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "t1$alice").unwrap();
    backend.fetch().await.unwrap();
    backend.create(&desired_alice()).await.unwrap();
    backend.delete(&desired_alice()).await.unwrap();

    // the mock only matches uid=t1$alice, so three matched requests prove
    // the effective identifier was used throughout
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_credential_change_revokes_then_updates() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/admin/user"))
        .and(query_param("access-key", "OLDAK"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_body()))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "alice").unwrap();

    let observed = UserState {
        keys: Some(KeyPair {
            access_key: "OLDAK".to_string(),
            secret_key: "OLDSK".to_string(),
        }),
        ..desired_alice()
    };
    let desired = UserState {
        keys: Some(KeyPair {
            access_key: "NEWAK".to_string(),
            secret_key: "NEWSK".to_string(),
        }),
        ..desired_alice()
    };

    let (_state, errors) = backend.update(&observed, &desired).await;
    assert!(errors.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "DELETE");
    assert!(requests[0].url.query().unwrap().contains("key"));
    assert_eq!(requests[1].method.as_str(), "POST");
    assert!(requests[1].url.query().unwrap().contains("access-key=NEWAK"));
}

#[tokio::test]
async fn test_failed_revoke_still_attempts_update() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/admin/user"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"Code": "InternalError"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_body()))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "alice").unwrap();

    let observed = UserState {
        keys: Some(KeyPair {
            access_key: "OLDAK".to_string(),
            secret_key: "OLDSK".to_string(),
        }),
        ..desired_alice()
    };
    let desired = UserState {
        keys: Some(KeyPair {
            access_key: "NEWAK".to_string(),
            secret_key: "NEWSK".to_string(),
        }),
        ..desired_alice()
    };

    let (state, errors) = backend.update(&observed, &desired).await;

    // revoke failed but the update went through; both outcomes are visible
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("InternalError"));
    assert!(state.is_some());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "DELETE");
    assert_eq!(requests[1].method.as_str(), "POST");
}

#[tokio::test]
async fn test_delete_missing_user_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/admin/user"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"Code": "NoSuchUser"})))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "ghost").unwrap();
    assert!(backend.delete(&desired_alice()).await.is_ok());
}

#[tokio::test]
async fn test_reconcile_existing_user_without_managed_keys_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/user"))
        .and(query_param("uid", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice_body()))
        .mount(&server)
        .await;

    let backend = UserBackend::new(&conn_for(&server), "alice").unwrap();
    let report = reconcile(
        &backend,
        Desired::Present(desired_alice()),
        ReconcileOptions::default(),
    )
    .await;

    // gateway-held keys are unmanaged here and must not force an update
    assert!(!report.changed, "errors: {:?}", report.error_messages);
    assert!(!report.failed());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
