#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doorwatch_api::{ClassifierClient, Error, TransportConfig};

fn labels() -> Vec<String> {
    vec!["burglar-alert".into(), "no-burglar-alert".into()]
}

async fn setup(transport: &TransportConfig) -> (MockServer, ClassifierClient) {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}/v1/classify", server.uri())).unwrap();
    let client = ClassifierClient::new(endpoint, transport).unwrap();
    (server, client)
}

#[tokio::test]
async fn predict_returns_probabilities() {
    let (server, client) = setup(&TransportConfig::default()).await;

    Mock::given(method("POST"))
        .and(path("/v1/classify"))
        .and(body_string_contains("\"burglar-alert\""))
        .and(body_string_contains("frontdoor-0001.jpg"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "probabilities": [0.8, 0.2] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let probabilities = client
        .predict(
            "frontdoor-0001.jpg",
            Bytes::from_static(b"fake-jpeg-bytes"),
            &labels(),
        )
        .await
        .unwrap();

    assert_eq!(probabilities, vec![0.8, 0.2]);
}

#[tokio::test]
async fn bearer_token_is_sent() {
    let transport = TransportConfig {
        bearer_token: Some(SecretString::from("test-token")),
        ..TransportConfig::default()
    };
    let (server, client) = setup(&transport).await;

    Mock::given(method("POST"))
        .and(path("/v1/classify"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "probabilities": [0.1, 0.9] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let probabilities = client
        .predict("cam.jpg", Bytes::from_static(b"img"), &labels())
        .await
        .unwrap();
    assert_eq!(probabilities, vec![0.1, 0.9]);
}

#[tokio::test]
async fn server_error_maps_to_classifier_error() {
    let (server, client) = setup(&TransportConfig::default()).await;

    Mock::given(method("POST"))
        .and(path("/v1/classify"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let err = client
        .predict("cam.jpg", Bytes::from_static(b"img"), &labels())
        .await
        .unwrap_err();

    match err {
        Error::Classifier { status, ref message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "model loading");
        }
        other => panic!("expected Classifier error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_body_keeps_raw_text() {
    let (server, client) = setup(&TransportConfig::default()).await;

    Mock::given(method("POST"))
        .and(path("/v1/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"scores\": []}"))
        .mount(&server)
        .await;

    let err = client
        .predict("cam.jpg", Bytes::from_static(b"img"), &labels())
        .await
        .unwrap_err();

    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "{\"scores\": []}"),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_classifier_hits_client_timeout() {
    let transport = TransportConfig {
        timeout: Duration::from_millis(200),
        ..TransportConfig::default()
    };
    let (server, client) = setup(&transport).await;
    assert_eq!(client.timeout(), Some(Duration::from_millis(200)));

    Mock::given(method("POST"))
        .and(path("/v1/classify"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "probabilities": [0.5, 0.5] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client
        .predict("cam.jpg", Bytes::from_static(b"img"), &labels())
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}
