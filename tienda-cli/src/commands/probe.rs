//! Establish a connection against a (possibly faulty) in-memory store.

use std::sync::Arc;

use anyhow::Result;
use tienda_bridge::ConnectionStatusView;
use tienda_client::{ClientConfig, MemoryStore, MockIdentityProvider, TiendaClient};
use tracing::info;

/// Faults to inject into the store before connecting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Probes never answer.
    pub hang: bool,
    /// The first probe is rejected.
    pub fail_probe: bool,
    /// The first disable is rejected.
    pub fail_disable: bool,
    /// The first enable is rejected.
    pub fail_enable: bool,
}

impl Faults {
    fn apply(&self, store: &MemoryStore) {
        store.hang_probes(self.hang);
        if self.fail_probe {
            store.fail_next_probe("simulated probe failure");
        }
        if self.fail_disable {
            store.fail_next_disable("simulated disable failure");
        }
        if self.fail_enable {
            store.fail_next_enable("simulated enable failure");
        }
    }
}

/// Run the probe command.
pub async fn run(config: ClientConfig, faults: Faults, retries: u32) -> Result<()> {
    let store = MemoryStore::new();
    faults.apply(&store);
    let client = TiendaClient::new(
        config,
        Arc::new(MockIdentityProvider::new()),
        Arc::new(store.clone()),
    );

    println!("=== tienda-cli probe ===");
    println!();
    print_status(&client);

    let mut connected = client.establish_connection().await;
    print_status(&client);

    let mut attempt = 0;
    while !connected && attempt < retries {
        attempt += 1;
        // Faults are one-shot; a hung probe stays hung, so clear it for retries.
        store.hang_probes(false);
        info!(attempt, "retrying connection");
        connected = client.retry_connection().await;
        print_status(&client);
    }

    println!();
    println!("Network calls:");
    for (call, _) in store.network_log() {
        println!("  {:?}", call);
    }
    println!();
    println!("Result: {}", if connected { "connected" } else { "failed" });

    Ok(())
}

fn print_status(client: &TiendaClient<MockIdentityProvider, MemoryStore>) {
    let view = ConnectionStatusView::new(client.connection_state(), client.connection_error());
    match view.error {
        Some(error) => println!("[{}] {} ({})", view.state, view.message, error),
        None => println!("[{}] {}", view.state, view.message),
    }
}
