//! CLI command handlers.

pub mod check;
pub mod info;
pub mod list;
pub mod reload;
pub mod run;
pub mod search;
pub mod workflow;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use secv_config::SecvConfig;
use secv_registry::{ModuleRegistry, ModuleRoot};
use serde_json::Value;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: SecvConfig,
    /// Roots given with `--root`; replace the configured roots when non-empty.
    pub roots: Vec<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn new(config: SecvConfig, roots: Vec<PathBuf>, json_output: bool, verbose: bool) -> Self {
        Self {
            config,
            roots,
            json_output,
            verbose,
        }
    }

    /// Roots to scan, in precedence order.
    pub fn module_roots(&self) -> Vec<ModuleRoot> {
        if !self.roots.is_empty() {
            return self.roots.iter().map(ModuleRoot::local).collect();
        }
        self.config
            .module_roots()
            .into_iter()
            .map(|r| ModuleRoot::new(r.path, r.source))
            .collect()
    }

    /// Scan the module roots.
    pub fn load_registry(&self) -> Arc<ModuleRegistry> {
        let registry = ModuleRegistry::load(self.module_roots());
        if self.verbose {
            let report = registry.snapshot().report().clone();
            for rejected in &report.rejected {
                eprintln!("skipped {}: {}", rejected.path.display(), rejected.reason);
            }
        }
        Arc::new(registry)
    }
}

/// Parse repeated `key=value` flags.
///
/// Values that parse as JSON keep their type (`ports=[22,80]`, `fast=true`);
/// anything else is taken as a plain string.
pub fn parse_params(pairs: &[String]) -> Result<HashMap<String, Value>> {
    let mut params = HashMap::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("invalid parameter '{pair}': expected key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid parameter '{pair}': empty key");
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}
