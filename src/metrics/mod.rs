//! Built-in metrics for change dispatch.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Change events dispatched
//! - Session outcomes (acknowledged, removed, abandoned, cancelled)
//! - Session duration
//! - Active subscribers
//!
//! # Examples
//!
//! ```rust,no_run
//! use configio::prelude::*;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let manager = ConfigManager::builder()
//!     .with_file("config.json")
//!     .with_metrics(meter)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod dispatch_metrics;

pub use dispatch_metrics::DispatchMetrics;
