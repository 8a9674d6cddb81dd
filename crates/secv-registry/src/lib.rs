//! Module registry for SecV.
//!
//! Modules are directories containing a `module.json` manifest next to the
//! executable it names. The registry walks one or more roots, validates every
//! manifest it finds, and indexes the survivors by name.
//!
//! # Layout
//!
//! ```text
//! tools/                      # root, source "local"
//!   scanning/
//!     portscan/
//!       module.json
//!       portscan.py
//! .secv/cache/acme/tools/     # root, source "acme"
//!   portscan/
//!     module.json             # indexed as "acme-portscan"
//! ```
//!
//! Name clashes across sources are resolved by renaming the later module to
//! `<source>-<name>`. Reloading builds a fresh index and swaps it in, so
//! readers never observe a half-built registry.

pub mod discovery;
pub mod error;
pub mod health;
pub mod manifest;
pub mod registry;

pub use discovery::{ModuleRoot, find_manifests};
pub use error::{RegistryError, Result};
pub use health::{ModuleHealth, check_dependencies, check_dependencies_in};
pub use manifest::{MANIFEST_FILE, ManifestError, ManifestParseError, ModuleManifest};
pub use registry::{
    InsertOutcome, LoadReport, ModuleRegistry, RegistryIndex, RejectedManifest, ResolvedModule,
};
