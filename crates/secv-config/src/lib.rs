//! Configuration for SecV.
//!
//! TOML files, layered (later overrides earlier):
//! 1. `<config_dir>/secv/config.toml`, or `$SECV_CONFIG_DIR/config.toml`
//! 2. `./secv.toml`
//!
//! ```toml
//! [modules]
//! roots = [{ path = "tools" }, { path = "/opt/secv/extra", source = "extra" }]
//!
//! [workflows]
//! dir = "workflows"
//! wait_timeout_secs = 3600
//!
//! [[repositories]]
//! name = "acme"
//! path = ".secv/cache/acme"
//!
//! [logging]
//! level = "info"
//! json_file = true
//! ```

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, LayerState, LoadedConfig, config_dir, config_path, load_config,
    load_config_with_options, log_dir, read_layer,
};
pub use error::{ConfigError, Result};
pub use types::*;
