//! Configuration loading and env substitution.
//!
//! Config files: `wayfarer.toml`, `wayfarer.yaml`, `wayfarer.yml` or `wayfarer.json`.
//! Searched in `./` then the user config directory (`~/.config/wayfarer/` on Linux).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{ConfigError, Result},
    loader::{config_dir, discover_and_load, load_config},
    schema::{BrowserConfig, ExecutorConfig, PathsConfig, ReplayConfig, WayfarerConfig},
};
