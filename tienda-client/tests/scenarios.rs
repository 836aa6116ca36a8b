//! End-to-end scenarios against the in-memory backends.
//!
//! Run with: cargo test -p tienda-client --test scenarios

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tienda_client::{
    ClientConfig, ClientError, MemoryStore, MockIdentityProvider, NetworkCall, TiendaClient,
};
use tienda_core::ConnectionState;
use tienda_types::{Credentials, Fields, Identity, Product, Session, UserId};
use tokio::time::Instant;

type Client = TiendaClient<MockIdentityProvider, MemoryStore>;

fn build(config: ClientConfig) -> (Client, MockIdentityProvider, MemoryStore) {
    let provider = MockIdentityProvider::new().with_account("ana@tienda.mx", "secreto1");
    let store = MemoryStore::new();
    let client = TiendaClient::new(config, Arc::new(provider.clone()), Arc::new(store.clone()));
    (client, provider, store)
}

fn product(nombre: &str, creado: &str) -> Fields {
    match json!({"nombre": nombre, "precio": 10.0, "vendido": false, "creado": creado}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

async fn signed_in(client: &Client) {
    client
        .sign_in(&Credentials::new("ana@tienda.mx", "secreto1"))
        .await
        .unwrap();
}

// ===========================================
// Connection Scenarios
// ===========================================

#[tokio::test(start_paused = true)]
async fn probe_within_two_seconds_connects() {
    let (client, _provider, store) = build(ClientConfig::default());
    store.set_probe_delay(Some(Duration::from_secs(2)));

    assert!(client.establish_connection().await);
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    assert_eq!(store.network_calls(), vec![NetworkCall::Probe]);
}

#[tokio::test(start_paused = true)]
async fn hung_probe_falls_back_to_recovery_then_fails() {
    let (client, _provider, store) = build(ClientConfig::default());
    store.hang_probes(true);
    store.fail_next_enable("network unavailable");

    let start = Instant::now();
    let connected = client.establish_connection().await;

    assert!(!connected);
    assert_eq!(client.connection_state(), ConnectionState::Failed);
    assert!(client.connection_error().is_some());

    let log = store.network_log();
    let calls: Vec<_> = log.iter().map(|(call, _)| *call).collect();
    assert_eq!(
        calls,
        vec![NetworkCall::Probe, NetworkCall::Disable, NetworkCall::Enable]
    );
    assert!(log[1].1 - start >= Duration::from_millis(10_000));
}

#[tokio::test(start_paused = true)]
async fn probes_that_miss_the_deadline_never_hang() {
    for delay_ms in [10_001, 15_000, 60_000] {
        let (client, _provider, store) = build(ClientConfig::default());
        store.set_probe_delay(Some(Duration::from_millis(delay_ms)));

        let start = Instant::now();
        assert!(!client.supervisor().check_connection().await);
        assert!(start.elapsed() < Duration::from_millis(10_001));
        assert_eq!(client.connection_state(), ConnectionState::Failed);
    }
}

#[tokio::test(start_paused = true)]
async fn recovery_honours_configured_quiescence() {
    let mut config = ClientConfig::default();
    config.connection.quiescence_ms = 2_500;
    let (client, _provider, store) = build(config);

    assert!(client.supervisor().reinitialize_connection().await);

    let log = store.network_log();
    assert_eq!(log[0].0, NetworkCall::Disable);
    assert_eq!(log[1].0, NetworkCall::Enable);
    assert!(log[1].1 - log[0].1 >= Duration::from_millis(2_500));
}

#[tokio::test(start_paused = true)]
async fn retry_after_failure_recovers() {
    let (client, _provider, store) = build(ClientConfig::default());
    store.set_probe_error(Some("offline"));
    store.fail_next_disable("offline");
    assert!(!client.establish_connection().await);
    assert!(client.connection_state().needs_retry());

    store.set_probe_error(None);
    assert!(client.retry_connection().await);
    assert_eq!(client.connection_state(), ConnectionState::Connected);
}

// ===========================================
// Profile Scenarios
// ===========================================

#[tokio::test]
async fn concurrent_first_time_ensure_is_consistent() {
    for atomic in [true, false] {
        let mut config = ClientConfig::default();
        config.profile.prefer_atomic_create = atomic;
        let (client, provider, store) = build(config);
        provider.set_session(Session::authenticated(Identity::new("u1", "u1@tienda.mx")));
        let uid = UserId::new("u1");

        let (a, b) = tokio::join!(client.ensure_profile(&uid), client.ensure_profile(&uid));
        let (a, b) = (a.unwrap(), b.unwrap());

        for profile in [&a, &b] {
            assert_eq!(profile.nombre, "");
            assert_eq!(profile.titulo_universitario, "");
            assert_eq!(profile.ano_graduacion, "");
            assert_eq!(profile.email, "u1@tienda.mx");
            assert!(profile.created_at.is_some());
        }
        assert_eq!(store.write_count("users"), 1);

        let stored = store.documents("users");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get_str("email"), Some("u1@tienda.mx"));
        assert_eq!(stored[0].get_str("createdAt"), a.created_at.as_deref());
    }
}

#[tokio::test]
async fn ensure_on_existing_profile_writes_nothing() {
    let (client, provider, store) = build(ClientConfig::default());
    provider.set_session(Session::authenticated(Identity::new("u1", "u1@tienda.mx")));
    let mut fields = Fields::new();
    fields.insert("nombre".into(), json!("Ana"));
    fields.insert("email".into(), json!("u1@tienda.mx"));
    store.insert("users", "u1", fields);

    let profile = client.ensure_profile(&UserId::new("u1")).await.unwrap();

    assert_eq!(profile.nombre, "Ana");
    assert_eq!(store.write_count("users"), 0);
}

// ===========================================
// Live Query Scenarios
// ===========================================

#[tokio::test]
async fn unmounted_subscription_ignores_later_inserts() {
    let (client, _provider, store) = build(ClientConfig::default());
    signed_in(&client).await;
    store.insert("productos", "b", product("Mouse", "2024-01-01T00:00:00.000Z"));
    store.insert("productos", "a", product("Laptop", "2024-02-01T00:00:00.000Z"));

    let seen: Arc<Mutex<Vec<Vec<Product>>>> = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let subscription = client
        .subscribe_inventory(move |products| s.lock().unwrap().push(products))
        .await
        .unwrap();

    {
        let seen = seen.lock().unwrap();
        let ids: Vec<_> = seen[0].iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    subscription.cancel();
    store.insert("productos", "c", product("Teclado", "2024-03-01T00:00:00.000Z"));

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn delivery_scheduled_before_cancel_is_suppressed() {
    let (client, _provider, store) = build(ClientConfig::default());
    signed_in(&client).await;
    let count = Arc::new(Mutex::new(0usize));
    let c = Arc::clone(&count);
    let subscription = client
        .subscribe_inventory(move |_| *c.lock().unwrap() += 1)
        .await
        .unwrap();

    store.set_manual_dispatch(true);
    store.insert("productos", "a", product("Laptop", "2024-02-01"));
    assert_eq!(store.pending_count(), 1);
    subscription.cancel();
    store.dispatch_pending();

    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test]
async fn sign_out_cancels_before_listener_returns() {
    let (client, _provider, store) = build(ClientConfig::default());
    signed_in(&client).await;
    let subscription = Arc::new(client.subscribe_inventory(|_| {}).await.unwrap());

    let observed: Arc<Mutex<Vec<(bool, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let (o, sub) = (Arc::clone(&observed), Arc::clone(&subscription));
    let _listener = client.on_session_change(move |session| {
        o.lock()
            .unwrap()
            .push((session.is_authenticated(), sub.is_active()));
    });

    client.sign_out().await.unwrap();

    assert_eq!(*observed.lock().unwrap(), vec![(false, false)]);
    assert_eq!(store.active_queries(), 0);
}

#[tokio::test]
async fn no_subscription_survives_into_the_next_session() {
    let (client, provider, store) = build(ClientConfig::default());
    signed_in(&client).await;
    let first = client.subscribe_inventory(|_| {}).await.unwrap();

    provider.set_session(Session::authenticated(Identity::new("uid-otro", "otro@tienda.mx")));

    assert!(!first.is_active());
    assert_eq!(store.active_queries(), 0);

    let second = client.subscribe_inventory(|_| {}).await.unwrap();
    assert!(second.is_active());
    assert!(second.epoch() > first.epoch());
    assert_eq!(client.live_queries().active_count(), 1);
}

#[tokio::test]
async fn signed_out_user_cannot_subscribe() {
    let (client, _provider, _store) = build(ClientConfig::default());
    let result = client.subscribe_inventory(|_| {}).await;
    assert!(matches!(result, Err(ClientError::NotAuthenticated)));
}

#[tokio::test]
async fn stream_of_inventory_snapshots() {
    let (client, _provider, store) = build(ClientConfig::default());
    signed_in(&client).await;
    let query = client.config().inventory_query();
    let mut stream = client.live_queries().subscribe_stream(query).await.unwrap();

    store.insert("productos", "a", product("Laptop", "2024-02-01"));
    store.insert("productos", "b", product("Mouse", "2024-03-01"));

    assert!(stream.next().await.unwrap().is_empty());
    assert_eq!(stream.next().await.unwrap().len(), 1);
    let latest = stream.next().await.unwrap();
    assert_eq!(latest[0].id.as_str(), "b");

    client.sign_out().await.unwrap();
    assert!(stream.next().await.is_none());
}
