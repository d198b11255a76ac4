// src/config/mod.rs
pub mod watcher;

pub use watcher::{load_config_default, load_config_from, RuntimeConfig, WatcherConfig};
