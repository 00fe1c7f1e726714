use marketplace_backend::accounts::{AccountProvider, IdentityToolkitClient, NewAccount, ProviderError};
use marketplace_backend::config::IdentityToolkitConfig;
use marketplace_common::Provider;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> IdentityToolkitClient {
    IdentityToolkitClient::new(&IdentityToolkitConfig {
        base_url: server.uri(),
        api_key: "test-api-key".to_string(),
    })
}

fn account() -> NewAccount {
    NewAccount {
        email: "esi@example.com".to_string(),
        password: "hunter22".to_string(),
        display_name: "Esi Mensah".to_string(),
    }
}

#[tokio::test]
async fn test_create_account() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .and(query_param("key", "test-api-key"))
        .and(body_partial_json(json!({
            "email": "esi@example.com",
            "password": "hunter22",
            "displayName": "Esi Mensah",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": "pw-esi",
            "email": "esi@example.com",
            "idToken": "ignored"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let claim = client(&server).create_account(&account()).await.unwrap();
    assert_eq!(claim.subject_id, "pw-esi");
    assert_eq!(claim.email.as_deref(), Some("esi@example.com"));
    assert_eq!(claim.display_name.as_deref(), Some("Esi Mensah"));
    assert!(!claim.email_verified);
}

#[tokio::test]
async fn test_existing_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "EMAIL_EXISTS" }
        })))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).create_account(&account()).await,
        Err(ProviderError::AlreadyExists)
    ));
}

#[tokio::test]
async fn test_weak_password_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "WEAK_PASSWORD : Password should be at least 6 characters"
            }
        })))
        .mount(&server)
        .await;

    match client(&server).create_account(&account()).await {
        Err(ProviderError::Rejected(message)) => assert!(message.starts_with("WEAK_PASSWORD")),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).create_account(&account()).await,
        Err(ProviderError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_sign_in_returns_existing_account() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .and(query_param("key", "test-api-key"))
        .and(body_partial_json(json!({
            "email": "esi@example.com",
            "password": "hunter22",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": "pw-esi",
            "email": "esi@example.com",
            "displayName": "Esi Mensah",
            "registered": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let claim = client(&server)
        .sign_in("esi@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(claim.subject_id, "pw-esi");
    assert_eq!(claim.display_name.as_deref(), Some("Esi Mensah"));
    assert_eq!(claim.sign_in_provider, Some(Provider::Password));
}

#[tokio::test]
async fn test_sign_in_wrong_password_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" }
        })))
        .mount(&server)
        .await;

    match client(&server).sign_in("esi@example.com", "wrong").await {
        Err(ProviderError::Rejected(message)) => {
            assert_eq!(message, "INVALID_LOGIN_CREDENTIALS")
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}
