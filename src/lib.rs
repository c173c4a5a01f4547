//! # configio
//!
//! File-backed configuration with change notifications and retrying subscribers.
//!
//! ## Overview
//!
//! `configio` keeps configuration values in a single JSON document on disk and
//! tells interested components when that document changes:
//! - Values are stored per key, so several components can share one file
//! - Subscribers register a named callback that reports success or failure
//! - Every change is delivered to every subscriber concurrently
//! - A failing subscriber is removed and told about its failure exactly once
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use configio::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct ServerConfig {
//!     port: u16,
//! }
//!
//! impl Keyed for ServerConfig {
//!     fn key(&self) -> &str {
//!         "server"
//!     }
//! }
//!
//! # async fn example() -> configio::error::Result<()> {
//! let manager = ConfigManager::builder()
//!     .with_file("config/app.json")
//!     .build()
//!     .await?;
//!
//! let mut changes = manager.watch("server", (), |_cancel, _data, last_error| {
//!     if let Some(err) = last_error {
//!         eprintln!("server subscriber removed: {err}");
//!     }
//!     Status::ok()
//! });
//!
//! manager.marshal(&ServerConfig { port: 8080 })?;
//!
//! // Reading the change token lets the subscriber's session finish.
//! changes.recv().await;
//!
//! let mut cfg = ServerConfig::default();
//! manager.unmarshal(&mut cfg)?;
//! println!("Server port: {}", cfg.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Notification protocol
//!
//! For every change and every subscriber a notification session invokes the
//! callback, offers one token on the subscriber's [`Notifications`](notify::Notifications)
//! channel, and waits for both the token to be read and the callback's
//! [`Status`](notify::Status) to resolve. A failed status removes the subscriber
//! and triggers one retry invocation carrying the error. Cancelling the
//! process-wide token ends all sessions without removing anyone.
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): watch the backing file with `notify`
//! - `metrics`: record dispatch metrics through OpenTelemetry

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        ConfigManager, ConfigManagerBuilder, ConfigReader, ConfigWatcher, ConfigWriter, Keyed,
        WatchOptions,
    };
    pub use crate::error::{CallbackError, ConfigError, Result};
    pub use crate::notify::{CallbackResult, DispatchExit, Notifications, Status};
}
