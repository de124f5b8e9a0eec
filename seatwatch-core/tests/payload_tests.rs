//! Integration tests for core request and payload types.

use seatwatch_core::{
    extract_id, AvailabilityPayload, CredentialPolicy, EventRequest, PipelineError, ProxyConfig,
};

#[test]
fn test_event_request_to_id() {
    let request: EventRequest =
        serde_json::from_str(r#"{"eventUrl":"https://vendor.tld/event/example-9999"}"#).unwrap();
    assert_eq!(extract_id(&request.event_url).unwrap().as_str(), "9999");
    assert!(request.supplied_cookie().is_none());
}

#[test]
fn test_reference_payload_totals() {
    let body = r#"{"groups":[{"offerIds":["o1"],"places":{"A":{"1":["s1","s2"]}}}],"offers":[{"id":"o1","type":"standard"}]}"#;
    let value: serde_json::Value = serde_json::from_str(body).unwrap();
    let totals = AvailabilityPayload::from_value(&value).unwrap().seat_totals();
    assert_eq!(totals.total_standard, 2);
    assert_eq!(totals.total_resale, 0);
}

#[test]
fn test_policy_threshold_is_configurable() {
    let cookie = "a=".to_string() + &"x".repeat(98);
    assert!(CredentialPolicy::default().check(&cookie).is_err());
    assert!(CredentialPolicy::with_min_length(100).check(&cookie).is_ok());
}

#[test]
fn test_proxy_error_maps_to_configuration() {
    let err: PipelineError = ProxyConfig::resolve("::::").unwrap_err().into();
    assert_eq!(err.category(), "configuration_error");
    assert_eq!(err.status_code(), 500);
}
