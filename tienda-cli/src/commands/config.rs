//! Show the effective configuration.

use std::path::Path;

use tienda_client::ClientConfig;

/// Run the config command.
pub fn run(config: &ClientConfig, source: Option<&Path>) {
    println!("=== tienda-cli config ===");
    println!();
    match source {
        Some(path) => println!("Source: {}", path.display()),
        None => println!("Source: built-in defaults"),
    }
    println!();

    let supervisor = config.supervisor();
    println!("Connection:");
    println!("  Probe timeout: {:?}", supervisor.probe_timeout);
    println!("  Quiescence:    {:?}", supervisor.quiescence);
    match config.health_check_interval() {
        Some(interval) => println!("  Health checks: every {:?}", interval),
        None => println!("  Health checks: off"),
    }
    println!();

    println!("Retry:");
    match supervisor.retry.max_attempts {
        Some(max) => println!("  Max attempts: {}", max),
        None => println!("  Max attempts: unlimited"),
    }
    println!("  Backoff:      {:?}", supervisor.retry.backoff);
    println!();

    println!("Collections:");
    println!("  Profiles:  {}", config.collections.profiles);
    println!("  Inventory: {}", config.inventory_query());
    println!();

    println!("Profile:");
    println!(
        "  Atomic create: {}",
        if config.profile.prefer_atomic_create {
            "preferred"
        } else {
            "off"
        }
    );
}
