//! Core configuration management types.

mod builder;
mod keyed;
mod manager;
mod options;

pub use builder::{ConfigManagerBuilder, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE};
pub use keyed::{ConfigReader, ConfigWatcher, ConfigWriter, Keyed};
pub use manager::ConfigManager;
pub use options::{DEFAULT_BOUNDED_DELIVERY_TIMEOUT, DEFAULT_DEBOUNCE, WatchOptions};
