//! Dependency health checks.
//!
//! A module's `dependencies` are advisory: nothing stops a module from
//! running when one is missing. These checks only report which of them can
//! be found as executables on a search path.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use secv_types::ModuleDescriptor;
use serde::Serialize;

use crate::registry::ModuleRegistry;

/// Dependency status of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleHealth {
    pub module: String,
    /// Dependency name → where it was found.
    pub found: Vec<(String, PathBuf)>,
    pub missing: Vec<String>,
}

impl ModuleHealth {
    /// True when every declared dependency was found.
    pub fn is_healthy(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check `descriptor`'s dependencies against the process `PATH`.
pub fn check_dependencies(descriptor: &ModuleDescriptor) -> ModuleHealth {
    let path = std::env::var_os("PATH").unwrap_or_default();
    check_dependencies_in(descriptor, &path)
}

/// Check `descriptor`'s dependencies against an explicit search path.
///
/// Relative dependency paths (`./bin/tool`) are resolved against the module
/// directory.
pub fn check_dependencies_in(
    descriptor: &ModuleDescriptor,
    search_path: &OsStr,
) -> ModuleHealth {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for dependency in descriptor.dependencies.iter().map(|d| d.trim()) {
        if dependency.is_empty() {
            continue;
        }
        match locate(dependency, search_path, &descriptor.module_dir) {
            Some(path) => found.push((dependency.to_string(), path)),
            None => {
                tracing::debug!(
                    module = %descriptor.name,
                    dependency,
                    "dependency not found"
                );
                missing.push(dependency.to_string());
            }
        }
    }

    ModuleHealth {
        module: descriptor.name.clone(),
        found,
        missing,
    }
}

fn locate(dependency: &str, search_path: &OsStr, module_dir: &Path) -> Option<PathBuf> {
    which::which_in(dependency, Some(search_path), module_dir).ok()
}

impl ModuleRegistry {
    /// Check every indexed module's dependencies against the process `PATH`.
    pub fn check_health(&self) -> Vec<ModuleHealth> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        self.check_health_in(&path)
    }

    /// Check every indexed module's dependencies against `search_path`.
    pub fn check_health_in(&self, search_path: &OsStr) -> Vec<ModuleHealth> {
        let report: Vec<_> = self
            .list_all()
            .iter()
            .map(|d| check_dependencies_in(d, search_path))
            .collect();

        let unhealthy = report.iter().filter(|h| !h.is_healthy()).count();
        tracing::info!(
            modules = report.len(),
            unhealthy,
            "dependency check finished"
        );
        report
    }
}
