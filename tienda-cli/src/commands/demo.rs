//! Scripted walkthrough of the app's main flows.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tienda_bridge::{ProductView, TiendaHandle};
use tienda_client::ClientConfig;
use tienda_types::Registration;

/// Password used for the demo account.
const DEMO_PASSWORD: &str = "demo1234";

/// Parse `NAME=PRICE` arguments.
fn parse_products(products: &[String]) -> Result<Vec<(String, String)>> {
    products
        .iter()
        .map(|arg| {
            let (name, price) = arg
                .split_once('=')
                .with_context(|| format!("Expected NAME=PRICE, got {arg:?}"))?;
            Ok((name.to_string(), price.to_string()))
        })
        .collect()
}

fn print_inventory(products: &[ProductView]) {
    if products.is_empty() {
        println!("  (no products)");
    }
    for product in products {
        let mark = if product.vendido { "x" } else { " " };
        println!("  [{}] {:<24} {}", mark, product.nombre, product.precio_texto);
    }
}

/// Run the demo command.
pub async fn run(config: ClientConfig, email: &str, products: &[String]) -> Result<()> {
    let mut products = parse_products(products)?;
    if products.is_empty() {
        products = vec![
            ("Laptop Dell".to_string(), "1200.50".to_string()),
            ("Mouse inalámbrico".to_string(), "25".to_string()),
        ];
    }

    let handle = TiendaHandle::in_memory(config)?;

    println!("=== tienda-cli demo ===");
    println!();

    if !handle.establish_connection().await {
        bail!("{}", handle.connection_status().message);
    }
    println!("Connection: {}", handle.connection_status().message);

    let registration = Registration {
        nombre: "Usuario Demo".to_string(),
        email: email.to_string(),
        password: DEMO_PASSWORD.to_string(),
        confirm_password: DEMO_PASSWORD.to_string(),
        titulo_universitario: "Administración".to_string(),
        ano_graduacion: "2020".to_string(),
    };
    let session = handle
        .sign_up(registration)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!(
        "Signed up:  {} ({})",
        session.email.unwrap_or_default(),
        session.uid.unwrap_or_default()
    );

    let profile = handle
        .update_profile(
            "Usuario Demo".to_string(),
            "Ingeniería Industrial".to_string(),
            "2021".to_string(),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!(
        "Profile:    {} / {} / {}",
        profile.nombre, profile.titulo_universitario, profile.ano_graduacion
    );
    println!();

    let latest: Arc<std::sync::Mutex<Vec<ProductView>>> = Arc::default();
    let sink = Arc::clone(&latest);
    let subscription = handle
        .subscribe_inventory(move |products| {
            if let Ok(mut latest) = sink.lock() {
                *latest = products;
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let mut first_id = None;
    for (name, price) in &products {
        match handle.add_product(name.clone(), price.clone()).await {
            Ok(id) => {
                println!("Added:      {} ({})", name, id);
                first_id.get_or_insert(id);
            }
            Err(e) => println!("Rejected:   {} ({})", name, e.user_message()),
        }
    }
    if let Some(id) = first_id {
        handle
            .toggle_sold(id, false)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    }

    println!();
    println!("Inventory:");
    if let Ok(latest) = latest.lock() {
        print_inventory(&latest);
    }
    println!();

    handle
        .sign_out()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!(
        "Signed out; live inventory {}",
        if subscription.is_active() {
            "still active"
        } else {
            "closed"
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_price_pairs() {
        let parsed = parse_products(&["Laptop=1200.5".to_string()]).unwrap();
        assert_eq!(parsed, vec![("Laptop".to_string(), "1200.5".to_string())]);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(parse_products(&["Laptop".to_string()]).is_err());
    }

    #[tokio::test]
    async fn demo_runs_end_to_end() {
        run(ClientConfig::default(), "demo@tienda.mx", &[])
            .await
            .unwrap();
    }
}
