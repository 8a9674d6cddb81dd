//! Manifest discovery under module roots.

use std::path::{Path, PathBuf};

use secv_types::LOCAL_SOURCE;
use walkdir::WalkDir;

use crate::manifest::MANIFEST_FILE;

/// A directory tree to scan for modules, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRoot {
    pub path: PathBuf,
    /// Provenance tag stamped on every module found under `path`.
    pub source: String,
}

impl ModuleRoot {
    /// A root with an explicit source tag.
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    /// A root for the local tools directory.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::new(path, LOCAL_SOURCE)
    }
}

/// Find every `module.json` beneath `root`, in a stable order.
///
/// Hidden directories (`.git`, `.cache`, ...) below the root are not
/// descended into. Unreadable entries are logged and skipped.
pub fn find_manifests(root: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    let mut manifests = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE => {
                manifests.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "error walking module root");
            }
        }
    }
    manifests
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_finds_nested_manifests_in_order() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("scanning/portscan/module.json"));
        touch(&tmp.path().join("network/mac_spoof/module.json"));
        touch(&tmp.path().join("network/mac_spoof/README.md"));

        let found = find_manifests(tmp.path());
        assert_eq!(
            found,
            vec![
                tmp.path().join("network/mac_spoof/module.json"),
                tmp.path().join("scanning/portscan/module.json"),
            ]
        );
    }

    #[test]
    fn test_skips_hidden_directories() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join(".git/module.json"));
        touch(&tmp.path().join("visible/module.json"));

        let found = find_manifests(tmp.path());
        assert_eq!(found, vec![tmp.path().join("visible/module.json")]);
    }

    #[test]
    fn test_hidden_root_is_still_scanned() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".secv/cache/acme/tools");
        touch(&root.join("scan/module.json"));

        assert_eq!(find_manifests(&root), vec![root.join("scan/module.json")]);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(find_manifests(&tmp.path().join("nope")).is_empty());
    }

    #[test]
    fn test_root_constructors() {
        let root = ModuleRoot::local("tools");
        assert_eq!(root.source, "local");
        let root = ModuleRoot::new("cache/acme", "acme");
        assert_eq!(root.source, "acme");
    }
}
