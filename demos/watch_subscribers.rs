//! Example demonstrating change subscribers.
//!
//! This example shows how to:
//! - Subscribe named callbacks to configuration changes
//! - Report success or failure through a `Status`
//! - Observe a failing subscriber being removed and told about its error
//!
//! Run with: cargo run --example watch_subscribers

use configio::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct AppConfig {
    port: u16,
    new_ui: bool,
}

impl Keyed for AppConfig {
    fn key(&self) -> &str {
        "app"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Watch Subscribers Example ===\n");

    let dir = std::env::temp_dir().join("configio-watch-example");
    let manager = ConfigManager::builder()
        .with_file(dir.join("config.json"))
        .with_debounce(Duration::from_millis(50))
        .build()
        .await?;

    println!("Watching {}\n", manager.path().display());

    // A well-behaved subscriber that re-reads its section on every change.
    let reader = manager.clone();
    let mut app_changes = manager.watch("app", (), move |_cancel, _data, _last_error| {
        let mut cfg = AppConfig::default();
        match reader.unmarshal(&mut cfg) {
            Ok(()) => {
                println!("[app] port={} new_ui={}", cfg.port, cfg.new_ui);
                Status::ok()
            }
            Err(e) => Status::err(CallbackError::new(e)),
        }
    });

    // A subscriber that fails on its first notification.
    let attempts = Arc::new(AtomicUsize::new(0));
    let flaky_data = Arc::clone(&attempts);
    let mut flaky_changes = manager.watch("flaky", flaky_data, |_cancel, attempts, last_error| {
        let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match last_error {
            None => {
                println!("[flaky] invocation #{n}: failing");
                Status::err(CallbackError::msg("cannot apply configuration"))
            }
            Some(err) => {
                println!("[flaky] invocation #{n}: removed after error: {err}");
                Status::ok()
            }
        }
    });

    tokio::spawn(async move {
        while app_changes.recv().await.is_some() {
            println!("[app] change token received");
        }
    });
    tokio::spawn(async move {
        while flaky_changes.recv().await.is_some() {}
        println!("[flaky] notification channel closed");
    });

    println!("Subscribers: {:?}\n", manager.registry().names());

    println!("--- Update 1: port 8080 ---");
    manager.marshal(&AppConfig {
        port: 8080,
        new_ui: false,
    })?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("\n--- Update 2: enable new UI ---");
    manager.marshal(&AppConfig {
        port: 8080,
        new_ui: true,
    })?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("\nSubscribers: {:?}", manager.registry().names());
    println!("Flaky callback invoked {} times", attempts.load(Ordering::SeqCst));

    let exit = manager.close().await;
    println!("Watch ended: {:?}", exit);

    println!("\n=== Example Complete ===");
    Ok(())
}
