//! Session lifecycle against the mock engine: pairing, reconnect, logout

use std::sync::Arc;
use std::time::Duration;
use wamd::config::GatewayConfig;
use wamd::engine::{
    Device, EngineClient, Jid, MockCall, MockClient, MockDeviceStore, MockEngine, PairingEvent,
    Presence,
};
use wamd::{LoginOutcome, SessionError, SessionManager, SessionState};

fn gateway() -> (SessionManager<MockEngine>, MockEngine, MockDeviceStore) {
    let engine = MockEngine::new();
    let store = MockDeviceStore::new();
    let manager = SessionManager::new(
        engine.clone(),
        Arc::new(store.clone()),
        GatewayConfig::default(),
    );
    (manager, engine, store)
}

async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

async fn new_client(
    manager: &SessionManager<MockEngine>,
    engine: &MockEngine,
    key: &str,
) -> MockClient {
    manager.get_or_create(key, None).await.unwrap();
    engine.clients().pop().unwrap()
}

#[tokio::test]
async fn test_pair_then_send() {
    let (manager, engine, _store) = gateway();
    let client = new_client(&manager, &engine, "acme").await;
    client.script_pairing(vec![
        PairingEvent::Code {
            code: "2@first".to_string(),
            timeout: Duration::from_secs(60),
        },
        PairingEvent::Success,
    ]);
    client.register("628123");

    let outcome = manager.login("acme").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Pairing { expires_in_secs: 60, .. }));

    let presence_client = client.clone();
    eventually(move || presence_client.presence() == vec![Presence::Available]).await;
    assert_eq!(manager.state("acme").await.unwrap(), SessionState::Connected);

    let id = manager.send_text("acme", "628123", "paired!").await.unwrap();
    assert_eq!(client.sent()[0].id, id);
}

#[tokio::test]
async fn test_login_again_after_pairing_reconnects() {
    let (manager, engine, _store) = gateway();
    let client = new_client(&manager, &engine, "acme").await;
    client.script_pairing(vec![
        PairingEvent::Code {
            code: "2@first".to_string(),
            timeout: Duration::from_secs(60),
        },
        PairingEvent::Success,
    ]);

    manager.login("acme").await.unwrap();
    let paired = client.clone();
    eventually(move || paired.has_identity()).await;

    let outcome = manager.login("acme").await.unwrap();
    assert_eq!(outcome, LoginOutcome::Reconnected);
    assert_eq!(outcome.expires_in_secs(), 0);
}

#[tokio::test]
async fn test_stored_device_skips_pairing() {
    let (manager, engine, store) = gateway();
    let device = Device::paired(7, Jid::user("628000000009"));

    manager.get_or_create("acme", Some(device)).await.unwrap();
    let outcome = manager.login("acme").await.unwrap();

    assert_eq!(outcome, LoginOutcome::Reconnected);
    assert!(store.created().is_empty());
    assert_eq!(engine.clients()[0].count(&MockCall::PairingFeed), 0);
}

#[tokio::test]
async fn test_logout_then_send_is_not_found() {
    let (manager, engine, _store) = gateway();
    manager
        .get_or_create("acme", Some(Device::paired(1, Jid::user("628000000001"))))
        .await
        .unwrap();
    manager.connect("acme").await.unwrap();

    manager.logout("acme").await.unwrap();

    let err = manager.send_text("acme", "628123", "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::ClientNotFound(_)));
    assert!(!engine.clients()[0].is_connected());
}

#[tokio::test]
async fn test_logout_cancels_pending_pairing() {
    let (manager, engine, store) = gateway();
    let client = new_client(&manager, &engine, "acme").await;

    manager.login("acme").await.unwrap();
    manager.logout("acme").await.unwrap();

    assert!(manager.tenants().await.is_empty());
    assert!(store.deleted().is_empty());
    assert_eq!(client.count(&MockCall::Logout), 1);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let (manager, engine, _store) = gateway();
    let a = new_client(&manager, &engine, "a").await;
    let b = new_client(&manager, &engine, "b").await;
    a.pair_as(Jid::user("628000000001"));

    manager.connect("a").await.unwrap();

    assert!(a.is_connected());
    assert!(!b.is_connected());
    assert_eq!(manager.state("b").await.unwrap(), SessionState::Uninitialized);
}
