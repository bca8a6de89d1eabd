//! Presenter and scanner against mocked issuer/verifier functions.

use std::sync::Arc;
use std::time::Duration;

use ghostpass::{
    DenyReason, GhostPass, PermissionSet, PresenterPhase, ScanOutcome, SilentCuePlayer, SubjectId,
    CONNECTION_REASON, EXPIRED_GUIDANCE,
};
use serde_json::json;
use tokio::time::timeout;
use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

fn sdk_for(server: &MockServer, ttl_secs: u64) -> GhostPass {
    GhostPass::builder()
        .base_url(server.uri())
        .session_token("session-abc")
        .token_ttl_secs(ttl_secs)
        .display_window_secs(1)
        .sound_enabled(false)
        .build()
        .unwrap()
}

fn grant(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token": token,
        "expires_at": 1_700_000_030,
        "issued_at": 1_700_000_000
    }))
}

#[tokio::test]
async fn presenter_rotates_through_remote_issuer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/issue_token"))
        .and(bearer_token("session-abc"))
        .respond_with(grant("opaque-1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/issue_token"))
        .respond_with(grant("opaque-2"))
        .mount(&server)
        .await;

    let sdk = sdk_for(&server, 1);
    let presenter = sdk.presenter(
        Some(SubjectId::new("wallet-ada")),
        PermissionSet::wallet_defaults(),
    );
    let mut rx = presenter.subscribe();
    presenter.mount().await.unwrap();

    timeout(WAIT, rx.wait_for(|v| v.token() == Some("opaque-1")))
        .await
        .unwrap()
        .unwrap();
    let view = timeout(WAIT, rx.wait_for(|v| v.token() == Some("opaque-2")))
        .await
        .unwrap()
        .unwrap()
        .clone();

    assert_eq!(view.phase, PresenterPhase::Active);
    assert!(view.seconds_left() <= 1);
    presenter.unmount().await;
}

#[tokio::test]
async fn rejected_session_stops_the_presenter_asking() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/issue_token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("session expired"))
        .expect(1)
        .mount(&server)
        .await;

    let sdk = sdk_for(&server, 1);
    let presenter = sdk.presenter(
        Some(SubjectId::new("wallet-ada")),
        PermissionSet::wallet_defaults(),
    );
    let mut rx = presenter.subscribe();
    presenter.mount().await.unwrap();

    let view = timeout(WAIT, rx.wait_for(|v| v.phase == PresenterPhase::AuthRequired))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(view.pass, None);
    assert_eq!(view.banner, None);

    // several tick intervals pass without another request
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    presenter.unmount().await;
}

#[tokio::test]
async fn issuer_outage_shows_banner_not_server_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/issue_token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream db timeout"))
        .mount(&server)
        .await;

    let sdk = sdk_for(&server, 30);
    let presenter = sdk.presenter(
        Some(SubjectId::new("wallet-ada")),
        PermissionSet::wallet_defaults(),
    );
    let mut rx = presenter.subscribe();
    presenter.mount().await.unwrap();

    let view = timeout(WAIT, rx.wait_for(|v| v.phase == PresenterPhase::Error))
        .await
        .unwrap()
        .unwrap()
        .clone();
    let banner = view.banner.unwrap();
    assert!(!banner.contains("upstream"));
    assert_eq!(view.pass, None);
    presenter.unmount().await;
}

#[tokio::test]
async fn scanner_maps_remote_verdicts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify_token"))
        .and(body_json(json!({
            "token": "CC-12345678",
            "format": "legacy"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "ALLOW",
            "attributes": {"name": "Ada", "status_color": "gold", "badges": ["VIP"]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/verify_token"))
        .and(body_json(json!({
            "token": "opaque-1",
            "profile": "wallet-ada",
            "format": "structured"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "expired",
            "reason": "Token expired"
        })))
        .mount(&server)
        .await;

    let sdk = sdk_for(&server, 30);
    let scanner = sdk.scanner(Arc::new(SilentCuePlayer));
    let mut rx = scanner.subscribe();

    scanner.submit("VALID:CC-12345678").await.unwrap();
    let outcome = timeout(WAIT, rx.wait_for(ScanOutcome::is_terminal))
        .await
        .unwrap()
        .unwrap()
        .clone();
    match outcome {
        ScanOutcome::Verified { attributes, .. } => {
            assert_eq!(attributes.name.as_deref(), Some("Ada"));
            assert_eq!(attributes.status_color.as_deref(), Some("gold"));
            assert_eq!(attributes.badges, vec!["VIP".to_string()]);
        }
        other => panic!("expected Verified, got {other:?}"),
    }

    // back to idle once the display window is over
    timeout(WAIT, rx.wait_for(|o| *o == ScanOutcome::Idle))
        .await
        .unwrap()
        .unwrap();

    scanner
        .submit(r#"{"v":1,"token":"opaque-1","profile":"wallet-ada","exp":1700000030}"#)
        .await
        .unwrap();
    let outcome = timeout(WAIT, rx.wait_for(ScanOutcome::is_terminal))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(
        outcome,
        ScanOutcome::Expired {
            guidance: EXPIRED_GUIDANCE
        }
    );
    scanner.unmount().await;
}

#[tokio::test]
async fn verifier_outage_is_a_connection_denial() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify_token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("stack trace here"))
        .mount(&server)
        .await;

    let sdk = sdk_for(&server, 30);
    let scanner = sdk.scanner(Arc::new(SilentCuePlayer));
    let mut rx = scanner.subscribe();

    scanner.submit("VALID:CC-12345678").await.unwrap();
    let outcome = timeout(WAIT, rx.wait_for(ScanOutcome::is_terminal))
        .await
        .unwrap()
        .unwrap()
        .clone();

    assert_eq!(outcome, ScanOutcome::Denied(DenyReason::Connection));
    if let ScanOutcome::Denied(reason) = outcome {
        assert_eq!(reason.message(), CONNECTION_REASON);
    }
    scanner.unmount().await;
}
