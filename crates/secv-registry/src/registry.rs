//! The module index and its query surface.
//!
//! `ModuleRegistry` owns an immutable [`RegistryIndex`] behind an
//! `RwLock<Arc<_>>`. Loading builds a complete index off to the side and
//! swaps the `Arc`; queries clone the `Arc` and read without holding the lock.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use secv_types::{ModuleDescriptor, current_os, resolve_executable};

use crate::discovery::{ModuleRoot, find_manifests};
use crate::error::{RegistryError, Result};
use crate::manifest::ModuleManifest;

/// A manifest that was skipped during load.
#[derive(Debug, Clone)]
pub struct RejectedManifest {
    pub path: PathBuf,
    pub reason: String,
}

/// What happened to one descriptor offered to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored under its own name.
    Inserted(String),
    /// Stored as `<source>-<name>` because `name` was taken by another source.
    Renamed { original: String, renamed: String },
    /// Dropped: the name (or its renamed form) is already taken.
    Duplicate(String),
}

/// Summary of a load or reload.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Roots that were scanned (missing roots are skipped silently).
    pub roots_scanned: usize,
    pub loaded: usize,
    /// `(original, renamed)` pairs.
    pub renamed: Vec<(String, String)>,
    /// Manifests dropped because an equivalent module was already indexed.
    pub duplicates: Vec<PathBuf>,
    pub rejected: Vec<RejectedManifest>,
}

/// An immutable snapshot of indexed modules.
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    modules: BTreeMap<String, Arc<ModuleDescriptor>>,
    report: LoadReport,
}

impl RegistryIndex {
    /// Build an index by scanning `roots` in order.
    ///
    /// Earlier roots take precedence: a later module with a clashing name is
    /// renamed (different source) or dropped (same source).
    pub fn build(roots: &[ModuleRoot]) -> Self {
        let mut index = Self::default();

        for root in roots {
            if !root.path.is_dir() {
                tracing::debug!(
                    root = %root.path.display(),
                    source = %root.source,
                    "module root does not exist, skipping"
                );
                continue;
            }
            index.report.roots_scanned += 1;

            for manifest_path in find_manifests(&root.path) {
                index.load_manifest(manifest_path, root);
            }
        }

        tracing::info!(
            count = index.modules.len(),
            rejected = index.report.rejected.len(),
            renamed = index.report.renamed.len(),
            "module registry loaded"
        );

        index
    }

    fn load_manifest(&mut self, manifest_path: PathBuf, root: &ModuleRoot) {
        let manifest = match ModuleManifest::from_file(&manifest_path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    manifest = %manifest_path.display(),
                    error = %e,
                    "failed to load module, skipping"
                );
                self.report.rejected.push(RejectedManifest {
                    path: manifest_path,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let module_dir = manifest_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| root.path.clone());
        let descriptor = manifest.into_descriptor(&module_dir, &root.source);
        let version = descriptor.version.clone();

        match self.insert(descriptor) {
            InsertOutcome::Inserted(name) => {
                tracing::debug!(
                    module = %name,
                    version = %version,
                    source = %root.source,
                    "loaded module"
                );
                self.report.loaded += 1;
            }
            InsertOutcome::Renamed { original, renamed } => {
                tracing::info!(
                    module = %original,
                    renamed = %renamed,
                    "renamed module to avoid a name conflict"
                );
                self.report.loaded += 1;
                self.report.renamed.push((original, renamed));
            }
            InsertOutcome::Duplicate(name) => {
                tracing::warn!(
                    module = %name,
                    manifest = %manifest_path.display(),
                    "duplicate module, keeping the first one loaded"
                );
                self.report.duplicates.push(manifest_path);
            }
        }
    }

    /// Insert a descriptor, applying the conflict rules.
    pub fn insert(&mut self, mut descriptor: ModuleDescriptor) -> InsertOutcome {
        let original = descriptor.name.clone();

        let Some(existing) = self.modules.get(&original) else {
            self.modules.insert(original.clone(), Arc::new(descriptor));
            return InsertOutcome::Inserted(original);
        };

        if existing.source == descriptor.source {
            return InsertOutcome::Duplicate(original);
        }

        let renamed = format!("{}-{}", descriptor.source, original);
        if self.modules.contains_key(&renamed) {
            return InsertOutcome::Duplicate(renamed);
        }

        descriptor.name = renamed.clone();
        self.modules.insert(renamed.clone(), Arc::new(descriptor));
        InsertOutcome::Renamed { original, renamed }
    }

    /// Look up a module by its registered name.
    pub fn get(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.modules.get(name).cloned()
    }

    /// All modules, ordered by name.
    pub fn all(&self) -> Vec<Arc<ModuleDescriptor>> {
        self.modules.values().cloned().collect()
    }

    /// Modules whose category matches, ignoring case.
    pub fn by_category(&self, category: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.modules
            .values()
            .filter(|m| m.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over name, description and category.
    pub fn search(&self, query: &str) -> Vec<Arc<ModuleDescriptor>> {
        let needle = query.to_lowercase();
        self.modules
            .values()
            .filter(|m| {
                m.name.to_lowercase().contains(&needle)
                    || m.description.to_lowercase().contains(&needle)
                    || m.category.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Distinct categories, lowercased and sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .modules
            .values()
            .map(|m| m.category.to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The report from the load that produced this index.
    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}

/// A descriptor paired with the command selected for the running OS.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub descriptor: Arc<ModuleDescriptor>,
    pub command: String,
}

/// Shared, reloadable module registry.
///
/// Construct once and hand out `Arc<ModuleRegistry>`; all queries are safe
/// from any thread.
#[derive(Debug)]
pub struct ModuleRegistry {
    roots: Vec<ModuleRoot>,
    index: RwLock<Arc<RegistryIndex>>,
}

impl ModuleRegistry {
    /// Scan `roots` and build the initial index.
    pub fn load(roots: Vec<ModuleRoot>) -> Self {
        let index = RegistryIndex::build(&roots);
        Self {
            roots,
            index: RwLock::new(Arc::new(index)),
        }
    }

    /// A registry over a prebuilt index, with no roots to reload from.
    pub fn from_index(index: RegistryIndex) -> Self {
        Self {
            roots: Vec::new(),
            index: RwLock::new(Arc::new(index)),
        }
    }

    /// The roots this registry scans.
    pub fn roots(&self) -> &[ModuleRoot] {
        &self.roots
    }

    /// Rescan every root and atomically replace the index.
    ///
    /// Callers holding a previous [`snapshot`](Self::snapshot) keep seeing
    /// the old modules until they take a new one.
    pub fn reload(&self) -> LoadReport {
        let fresh = Arc::new(RegistryIndex::build(&self.roots));
        let report = fresh.report().clone();
        *self.index.write() = fresh;
        report
    }

    /// The current index.
    pub fn snapshot(&self) -> Arc<RegistryIndex> {
        self.index.read().clone()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.snapshot().get(name)
    }

    pub fn list_all(&self) -> Vec<Arc<ModuleDescriptor>> {
        self.snapshot().all()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.snapshot().by_category(category)
    }

    pub fn search(&self, query: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.snapshot().search(query)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Find a module and the command to run it on the current OS.
    pub fn lookup(&self, name: &str) -> Result<ResolvedModule> {
        self.lookup_for_os(name, current_os())
    }

    /// Find a module and the command to run it on `os`.
    pub fn lookup_for_os(&self, name: &str, os: &str) -> Result<ResolvedModule> {
        let descriptor = self
            .get_by_name(name)
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))?;

        let command = resolve_executable(os, &descriptor)
            .ok_or_else(|| RegistryError::NoExecutable {
                module: name.to_string(),
                os: os.to_string(),
            })?
            .to_string();

        Ok(ResolvedModule {
            descriptor,
            command,
        })
    }
}
