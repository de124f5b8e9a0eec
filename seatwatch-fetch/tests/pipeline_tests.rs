//! End-to-end pipeline tests against a mock vendor API.

use seatwatch_core::{AvailabilityPayload, EventRequest, PipelineError, SessionFailureReason};
use seatwatch_fetch::{AvailabilityPipeline, PipelineSettings, ProviderKind};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENT_URL: &str = "https://vendor.tld/event/example-9999";

fn cookie_of_len(len: usize) -> String {
    let mut cookie = String::from("reese84=");
    while cookie.len() < len {
        cookie.push('x');
    }
    cookie
}

fn reference_payload() -> Value {
    json!({
        "groups": [{"offerIds": ["o1"], "places": {"A": {"1": ["s1", "s2"]}}}],
        "offers": [{"id": "o1", "type": "standard"}]
    })
}

fn caller_pipeline(server: &MockServer) -> AvailabilityPipeline {
    let settings = PipelineSettings::builder()
        .provider(ProviderKind::Caller)
        .api_base(server.uri())
        .build();
    AvailabilityPipeline::from_settings(settings).unwrap()
}

#[tokio::test]
async fn test_caller_cookie_end_to_end() {
    let server = MockServer::start().await;
    let cookie = cookie_of_len(512);

    Mock::given(method("GET"))
        .and(path("/api/v2/TM_NL/availability/9999"))
        .and(query_param("subChannelId", "1"))
        .and(header("Cookie", cookie.as_str()))
        .and(header("Referer", EVENT_URL))
        .respond_with(ResponseTemplate::new(200).set_body_json(reference_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = caller_pipeline(&server)
        .run_detailed(&EventRequest::new(EVENT_URL).with_cookie(cookie))
        .await;

    assert_eq!(outcome.provider(), Some(ProviderKind::Caller));
    let payload = outcome.result.unwrap();
    assert_eq!(payload, reference_payload());

    let totals = AvailabilityPayload::from_value(&payload).unwrap().seat_totals();
    assert_eq!(totals.total_standard, 2);
}

#[tokio::test]
async fn test_unset_static_credential_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reference_payload()))
        .expect(0)
        .mount(&server)
        .await;

    let settings = PipelineSettings::builder()
        .provider(ProviderKind::Static)
        .api_base(server.uri())
        .build();
    let pipeline = AvailabilityPipeline::from_settings(settings).unwrap();

    let err = pipeline.run(&EventRequest::new(EVENT_URL)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(err.status_code(), 500);
    // Operators see the detail in logs; callers get a generic message.
    assert!(!err.to_response().details.unwrap_or_default().contains("TM_COOKIE"));
}

#[tokio::test]
async fn test_missing_caller_cookie_is_400() {
    let server = MockServer::start().await;
    let err = caller_pipeline(&server)
        .run(&EventRequest::new(EVENT_URL))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MissingField("cookie")));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_short_cookie_rejected_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = caller_pipeline(&server)
        .run(&EventRequest::new(EVENT_URL).with_cookie(cookie_of_len(199)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::SessionAcquisition {
            reason: SessionFailureReason::IncompleteCredential,
            ..
        }
    ));
    let response = err.to_response();
    assert_eq!(response.error, "session_acquisition_failed");
    assert!(!response.details.unwrap_or_default().contains("xxxx"));
}

#[tokio::test]
async fn test_soft_block_under_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error":"You have been blocked"}"#))
        .mount(&server)
        .await;

    let err = caller_pipeline(&server)
        .run(&EventRequest::new(EVENT_URL).with_cookie(cookie_of_len(300)))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Blocked { .. }));
    assert_eq!(err.category(), "blocked");
}

#[tokio::test]
async fn test_vendor_error_status_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"groups": [], "offers": []})))
        .mount(&server)
        .await;

    let err = caller_pipeline(&server)
        .run(&EventRequest::new(EVENT_URL).with_cookie(cookie_of_len(300)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Upstream {
            status_code: Some(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_html_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .mount(&server)
        .await;

    let err = caller_pipeline(&server)
        .run(&EventRequest::new(EVENT_URL).with_cookie(cookie_of_len(300)))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MalformedPayload { .. }));
}

#[tokio::test]
async fn test_caller_preferred_static_fallback() {
    let server = MockServer::start().await;
    let static_cookie = cookie_of_len(256);

    Mock::given(method("GET"))
        .and(header("Cookie", static_cookie.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(reference_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let settings = PipelineSettings::builder()
        .provider(ProviderKind::Caller)
        .fallback(ProviderKind::Static)
        .static_cookie(static_cookie)
        .api_base(server.uri())
        .build();
    let pipeline = AvailabilityPipeline::from_settings(settings).unwrap();

    let outcome = pipeline.run_detailed(&EventRequest::new(EVENT_URL)).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.provider(), Some(ProviderKind::Static));
    assert_eq!(outcome.attempts.len(), 2);
}

#[tokio::test]
async fn test_unreachable_agent_is_agent_unavailable() {
    let settings = PipelineSettings::builder()
        .provider(ProviderKind::Agent)
        .agent(seatwatch_fetch::AgentSettings {
            url: "http://127.0.0.1:9/message".to_string(),
            ..seatwatch_fetch::AgentSettings::default()
        })
        .build();
    let pipeline = AvailabilityPipeline::from_settings(settings).unwrap();

    let err = pipeline.run(&EventRequest::new(EVENT_URL)).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SessionAcquisition {
            reason: SessionFailureReason::AgentUnavailable,
            ..
        }
    ));
}
