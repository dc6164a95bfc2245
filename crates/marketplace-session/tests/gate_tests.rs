/*
[INPUT]:  Request paths and cookie headers
[OUTPUT]: Test results for edge route admission
[POS]:    Integration tests - route gate
[UPDATE]: When route tables or redirect targets change
*/

mod common;

use std::sync::Arc;

use common::{client_for, setup_mock_server, test_user};
use marketplace_session::{
    GateConfig, GateDecision, MemoryTokenStore, RouteClass, RouteGate, TokenPair,
};
use rstest::rstest;
use tokio_test::assert_ok;

#[rstest]
#[case("/profile", false, GateDecision::Redirect { location: "/login".to_string() })]
#[case("/profile", true, GateDecision::Allow)]
#[case("/login", true, GateDecision::Redirect { location: "/".to_string() })]
#[case("/login", false, GateDecision::Allow)]
#[case("/auth/google-callback", false, GateDecision::Allow)]
#[case("/auth/google-callback", true, GateDecision::Allow)]
fn test_gate_decision_table(
    #[case] path: &str,
    #[case] cookie_present: bool,
    #[case] expected: GateDecision,
) {
    assert_eq!(RouteGate::default().evaluate(path, cookie_present), expected);
}

#[test]
fn test_gate_config_from_yaml_style_overrides() {
    let config: GateConfig = serde_json::from_value(serde_json::json!({
        "protected": ["/dashboard"],
        "login_path": "/signin",
    }))
    .unwrap();
    let gate = RouteGate::new(config);

    assert_eq!(gate.classify("/dashboard/orders"), RouteClass::Protected);
    assert_eq!(gate.classify("/profile"), RouteClass::Public);
    assert_eq!(
        gate.evaluate("/dashboard", false).redirect_location(),
        Some("/signin")
    );
    // untouched fields keep their defaults
    assert_eq!(gate.classify("/auth/google-callback"), RouteClass::OAuthCallback);
}

#[tokio::test]
async fn test_gate_sees_logout_on_next_request() {
    let server = setup_mock_server().await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
    let gate = RouteGate::default();

    assert_ok!(client.login(test_user(), &TokenPair::new("a-1", "r-1", Some(900))));
    let cookie = client.session_cookie_header();
    let request_cookie = cookie.split(';').next().unwrap().to_string();
    assert!(gate.evaluate_request("/profile", Some(&request_cookie)).is_allowed());

    assert_ok!(client.logout());
    let cookie = client.session_cookie_header();
    let request_cookie = cookie.split(';').next().unwrap().to_string();
    assert_eq!(
        gate.evaluate_request("/profile", Some(&request_cookie))
            .redirect_location(),
        Some("/login")
    );
}
