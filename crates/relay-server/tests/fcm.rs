//! FCM provider against a mocked OAuth and `messages:send` backend.

use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_server::push::{FcmConfig, FcmService, PushError, PushMessage, PushProvider, ServiceAccount};

const TEST_KEY: &str = include_str!("fixtures/fcm_test_key.pem");
const SEND_PATH: &str = "/v1/projects/relay-test/messages:send";

fn service(server: &MockServer) -> FcmService {
    let account = ServiceAccount {
        project_id: "relay-test".into(),
        client_email: "relay@relay-test.iam.gserviceaccount.com".into(),
        private_key: TEST_KEY.into(),
        token_uri: format!("{}/token", server.uri()),
    };
    let config = FcmConfig {
        api_base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
    };
    FcmService::new(account, &config).unwrap()
}

fn message(body: &str) -> PushMessage {
    PushMessage {
        token: "device-token-abcdef".into(),
        title: "New Message".into(),
        body: body.into(),
        data: HashMap::from([
            ("type".to_string(), "new_message".to_string()),
            ("conversation_id".to_string(), "7".to_string()),
        ]),
    }
}

async fn mount_token(server: &MockServer, access_token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn sends_high_priority_message_with_bearer_token() {
    let server = MockServer::start().await;
    mount_token(&server, "access-1", 1).await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({
            "message": {
                "token": "device-token-abcdef",
                "notification": {"title": "New Message", "body": "hello"},
                "data": {"type": "new_message", "conversation_id": "7"},
                "android": {"priority": "high"},
                "apns": {"headers": {"apns-priority": "10"}},
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "projects/relay-test/messages/0:1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let receipt = service(&server).send(&message("hello")).await.unwrap();
    assert_eq!(
        receipt.message_id.as_deref(),
        Some("projects/relay-test/messages/0:1")
    );
}

#[tokio::test]
async fn access_token_is_cached_across_sends() {
    let server = MockServer::start().await;
    mount_token(&server, "access-1", 1).await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "m"})))
        .expect(2)
        .mount(&server)
        .await;

    let fcm = service(&server);
    fcm.send(&message("one")).await.unwrap();
    fcm.send(&message("two")).await.unwrap();
}

#[tokio::test]
async fn provider_rejection_surfaces_status_and_body() {
    let server = MockServer::start().await;
    mount_token(&server, "access-1", 1).await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("UNREGISTERED"))
        .mount(&server)
        .await;

    let err = service(&server).send(&message("hello")).await.unwrap_err();
    assert_matches!(err, PushError::Provider { status: 404, ref body } if body.contains("UNREGISTERED"));
}

#[tokio::test]
async fn unauthorized_send_forces_token_refresh() {
    let server = MockServer::start().await;
    mount_token(&server, "access-1", 2).await;

    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "m"})))
        .expect(1)
        .mount(&server)
        .await;

    let fcm = service(&server);
    let first = fcm.send(&message("one")).await;
    assert_matches!(first, Err(PushError::Provider { status: 401, .. }));
    fcm.send(&message("two")).await.unwrap();
}

#[tokio::test]
async fn failed_token_exchange_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = service(&server).send(&message("hello")).await.unwrap_err();
    assert_matches!(err, PushError::TokenExchange(ref detail) if detail.contains("invalid_grant"));
}

#[tokio::test]
async fn stalled_token_exchange_does_not_block_other_sends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "slow", "expires_in": 3600}))
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_token(&server, "fast", 1).await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "m"})))
        .expect(2)
        .mount(&server)
        .await;

    let fcm = std::sync::Arc::new(service(&server));
    let stalled = {
        let fcm = std::sync::Arc::clone(&fcm);
        tokio::spawn(async move { fcm.send(&message("first")).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = tokio::time::timeout(Duration::from_millis(1500), fcm.send(&message("second")))
        .await
        .expect("second send waited on the stalled exchange");
    second.unwrap();

    stalled.await.unwrap().unwrap();
}
