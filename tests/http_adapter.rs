/// HTTP adapter against a local mock service
///
/// Runs on the real clock with millisecond backoff; a paused clock would fire
/// the client's own timeouts while sockets are idle.

mod common;

use serde::Deserialize;
use std::time::Duration;
use talking_head_resilience::adapters::{Capability, HttpAdapter};
use talking_head_resilience::error::{ErrorKind, RetryConfig, RetryError};
use talking_head_resilience::settings::{HttpSettings, RetryProfiles};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Voice {
    voice_id: String,
    name: String,
}

/// Built-in profiles with the waits shrunk to milliseconds
fn fast_profiles() -> RetryProfiles {
    let mut profiles = RetryProfiles::default();
    for capability in Capability::ALL {
        let base = capability.retry_config();
        let fast = RetryConfig::builder()
            .max_attempts(base.max_attempts())
            .initial_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(40))
            .retryable_kinds(base.retryable_kinds().iter().copied())
            .build()
            .unwrap();
        profiles.set(capability, fast);
    }
    profiles
}

fn adapter() -> HttpAdapter {
    let settings = HttpSettings {
        timeout_secs: 5,
        ..HttpSettings::default()
    };
    HttpAdapter::new(&settings)
        .unwrap()
        .with_profiles(fast_profiles())
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn test_recovers_from_service_unavailable() {
    common::init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/voices/abc"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/voices/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "voice_id": "abc",
            "name": "Narrator"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/v1/voices/abc", server.uri());
    let voice: Voice = adapter()
        .call_json(Capability::VoiceCatalog, |client| client.get(&url))
        .await
        .unwrap();

    assert_eq!(
        voice,
        Voice {
            voice_id: "abc".to_string(),
            name: "Narrator".to_string()
        }
    );
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_unauthorized_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "detail": { "message": "Invalid API key" }
        })))
        .mount(&server)
        .await;

    let url = format!("{}/v1/text-to-speech/abc", server.uri());
    let error = adapter()
        .call_bytes(Capability::SpeechSynthesis, |client| {
            client.post(&url).json(&serde_json::json!({ "text": "Hello" }))
        })
        .await
        .unwrap_err();

    assert!(matches!(error, RetryError::Rejected { attempts: 1, .. }));
    assert_eq!(error.kind(), Some(ErrorKind::AuthError));
    assert_eq!(error.error().unwrap().message(), "Invalid API key");
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_body_code_names_the_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "detail": {
                "status": "voice_clone_failed",
                "message": "Samples are too noisy"
            }
        })))
        .mount(&server)
        .await;

    let url = format!("{}/v1/voices/add", server.uri());
    let error = adapter()
        .call_json::<Voice, _>(Capability::VoiceCloning, |client| client.post(&url))
        .await
        .unwrap_err();

    // voice-clone-failed is retryable for cloning, so the whole budget is used
    assert!(matches!(error, RetryError::Exhausted { attempts: 3, .. }));
    assert_eq!(error.kind(), Some(ErrorKind::VoiceCloneFailed));
    assert_eq!(error.error().unwrap().message(), "Samples are too noisy");
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_capability_fallback_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/remove-background", server.uri());
    let error = adapter()
        .call_bytes(Capability::BackgroundRemoval, |client| {
            client.post(&url).body(vec![0u8; 64])
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), Some(ErrorKind::ImageProcessingFailed));
    assert_eq!(
        error.error().unwrap().message(),
        "Internal Server Error (HTTP 500)"
    );
    assert_eq!(error.attempts(), 2);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_undecodable_body_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let url = format!("{}/v1/voices/abc", server.uri());
    let error = adapter()
        .call_json::<Voice, _>(Capability::VoiceCatalog, |client| client.get(&url))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), Some(ErrorKind::ApiError));
    assert_eq!(error.attempts(), 3);
}

#[tokio::test]
async fn test_bytes_returned_untouched() {
    let server = MockServer::start().await;
    let audio = vec![0x49, 0x44, 0x33, 0x04, 0x00];
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.clone()))
        .mount(&server)
        .await;

    let url = format!("{}/v1/text-to-speech/abc", server.uri());
    let body = adapter()
        .call_bytes(Capability::SpeechSynthesis, |client| client.post(&url))
        .await
        .unwrap();

    assert_eq!(body, audio);
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Grab a free port, then close it so the connection is refused
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/v1/voices", addr);
    let error = adapter()
        .call_json::<Vec<Voice>, _>(Capability::VoiceCatalog, |client| client.get(&url))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), Some(ErrorKind::NetworkError));
    assert_eq!(error.attempts(), 3);
}

#[tokio::test]
async fn test_cancelled_call_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let url = server.uri();
    let error = adapter()
        .call_bytes_cancellable(Capability::VideoSynthesis, &token, |client| client.get(&url))
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(error.attempts(), 0);
}
