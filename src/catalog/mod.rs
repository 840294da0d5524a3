//! Module discovery, classification and lifecycle tracking.
//!
//! The [`ModuleCatalog`] owns every module a run discovers. Modules live in an arena and
//! are addressed by [`ModuleId`]; cross-module relations (references, mapping targets)
//! are always resolved by name through the catalog's index rather than held as
//! pointers, so rewriting one module never aliases another.
//!
//! # Classification
//!
//! Each discovered module gets a [`ModuleRole`]:
//!
//! - [`ModuleRole::MappingTarget`] - names a mapping target; opened read-only and only
//!   ever referenced
//! - [`ModuleRole::Engine`] - the engine's own module; read-only
//! - [`ModuleRole::Ordinary`] - references a legacy assembly and goes through the relink
//!   pipeline
//! - [`ModuleRole::Stub`] - not purely managed, replaced by a stub before relinking
//! - [`ModuleRole::Candidate`] - no legacy references yet; decided by
//!   [`ModuleCatalog::finalize`]
//! - [`ModuleRole::Removed`] / [`ModuleRole::Kept`] - not purely managed, handled by
//!   the removal or keep policy
//!
//! # Leases
//!
//! A stage takes a module out of the catalog with [`ModuleCatalog::acquire`], which
//! moves the [`Module`] to the caller and records the lease. While leased the module
//! cannot be acquired again or looked up as a dependency. The stage hands the lease back
//! with [`ModuleCatalog::complete`] and [`ModuleCatalog::mark_released`], or with
//! [`ModuleCatalog::abandon`] when it fails.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    codec::ModuleCodec,
    config::{MappingEntry, RelinkConfig},
    module::{Module, ReferenceDescriptor},
    order::OrderNode,
    report::{ModuleAction, RunReport, SkipReason},
    Error, Result,
};

mod backup;
mod lifecycle;
mod resolver;
mod scan;

pub use backup::{deploy_engine_files, is_engine_directory, restore_backup, BACKUP_DIR};
pub use lifecycle::{ModuleState, Stage};
pub use resolver::CatalogResolver;

/// Index of a module in the catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub usize);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// How the catalog classified a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleRole {
    /// A mapping target, never mutated
    MappingTarget,
    /// The engine's own module, never mutated
    Engine,
    /// Relinked by the pipeline
    Ordinary,
    /// Replaced by a stub
    Stub,
    /// Awaiting reclassification
    Candidate,
    /// Dropped by the removal policy
    Removed,
    /// Left alone by the keep policy
    Kept,
}

/// A module known to the catalog.
#[derive(Debug)]
pub struct CatalogEntry {
    id: ModuleId,
    name: String,
    path: PathBuf,
    role: ModuleRole,
    state: ModuleState,
    lease: Option<Stage>,
    module: Option<Module>,
}

impl CatalogEntry {
    /// Arena index of the entry.
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Assembly name of the module.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the module was read from and is written back to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classification of the module.
    #[must_use]
    pub fn role(&self) -> ModuleRole {
        self.role
    }

    /// Lifecycle state of the module.
    #[must_use]
    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Stage holding the mutation lease, if any.
    #[must_use]
    pub fn lease(&self) -> Option<Stage> {
        self.lease
    }

    /// The open module, `None` while leased or after release.
    #[must_use]
    pub fn module(&self) -> Option<&Module> {
        self.module.as_ref()
    }

    fn transition(&mut self, next: ModuleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                module: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// The working set of a relink run.
#[derive(Debug)]
pub struct ModuleCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, ModuleId>,
    directories: Vec<PathBuf>,
    remove_names: HashSet<String>,
    destroy_token_names: HashSet<String>,
    resolved_targets: Vec<Option<ModuleId>>,
    reopened: HashMap<String, Module>,
    engine_name: String,
    engine_path: PathBuf,
}

impl ModuleCatalog {
    /// Create an empty catalog for a run driven by `config`.
    ///
    /// `engine_name` is the assembly name of the engine's own module; modules with that
    /// name are never relinked.
    #[must_use]
    pub fn new(config: &RelinkConfig, engine_name: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            directories: Vec::new(),
            remove_names: config.remove_dependencies.iter().cloned().collect(),
            destroy_token_names: config.destroy_public_key_tokens.iter().cloned().collect(),
            resolved_targets: vec![None; config.mappings.len()],
            reopened: HashMap::new(),
            engine_name: engine_name.into(),
            engine_path: config.engine_module.clone(),
        }
    }

    /// Assembly name of the engine module.
    #[must_use]
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// All entries in discovery order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Number of discovered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by arena index.
    #[must_use]
    pub fn entry(&self, id: ModuleId) -> Option<&CatalogEntry> {
        self.entries.get(id.0)
    }

    /// Entry by assembly name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name).and_then(|id| self.entries.get(id.0))
    }

    /// Directories registered for dependency lookups, in registration order.
    #[must_use]
    pub fn search_directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Whether references named `name` are stripped.
    #[must_use]
    pub fn is_removed_dependency(&self, name: &str) -> bool {
        self.remove_names.contains(name)
    }

    /// Whether public key tokens of `name` are destroyed.
    #[must_use]
    pub fn destroys_token(&self, name: &str) -> bool {
        self.destroy_token_names.contains(name)
    }

    /// Whether `name` is a module the stub generator replaces.
    #[must_use]
    pub fn is_stubbed(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|entry| entry.role == ModuleRole::Stub)
    }

    /// Whether any module is replaced by a stub in this run.
    #[must_use]
    pub fn has_stubs(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.role == ModuleRole::Stub)
    }

    /// Ids of the modules the stub generator replaces, in discovery order.
    #[must_use]
    pub fn stub_ids(&self) -> Vec<ModuleId> {
        self.ids_with_role(ModuleRole::Stub)
    }

    /// Ids of every module with `role`, in discovery order.
    #[must_use]
    pub fn ids_with_role(&self, role: ModuleRole) -> Vec<ModuleId> {
        self.entries
            .iter()
            .filter(|entry| entry.role == role)
            .map(|entry| entry.id)
            .collect()
    }

    /// Whether mapping entry `index` found its target module.
    #[must_use]
    pub fn is_mapping_active(&self, index: usize) -> bool {
        self.resolved_target(index).is_some()
    }

    /// Catalog module mapping entry `index` resolved to.
    #[must_use]
    pub fn resolved_target(&self, index: usize) -> Option<ModuleId> {
        self.resolved_targets.get(index).copied().flatten()
    }

    /// The first active mapping entry remapping `name`, with the target it resolved to.
    #[must_use]
    pub fn active_mapping_for<'c>(
        &self,
        config: &'c RelinkConfig,
        name: &str,
    ) -> Option<(&'c MappingEntry, ModuleId)> {
        config
            .mappings
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_source(name))
            .find_map(|(index, entry)| self.resolved_target(index).map(|id| (entry, id)))
    }

    /// Reference descriptor binding against the open module `id`.
    ///
    /// # Errors
    /// Returns [`Error::ModuleNotFound`] if the module is not open.
    pub fn reference_to(&self, id: ModuleId) -> Result<ReferenceDescriptor> {
        self.entry(id)
            .and_then(CatalogEntry::module)
            .map(|module| module.assembly.to_reference())
            .ok_or_else(|| Error::ModuleNotFound(id.to_string()))
    }

    /// Snapshot of every open, non-stub module for the orderer, with matching ids.
    #[must_use]
    pub fn order_nodes(&self) -> (Vec<ModuleId>, Vec<OrderNode>) {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry.role,
                    ModuleRole::Ordinary | ModuleRole::MappingTarget | ModuleRole::Engine
                )
            })
            .filter_map(|entry| {
                entry.module.as_ref().map(|module| {
                    (
                        entry.id,
                        OrderNode::new(
                            entry.name.clone(),
                            module.reference_names().map(str::to_string),
                        ),
                    )
                })
            })
            .unzip()
    }

    /// Promote candidates to a fixpoint, then release and skip the rest.
    ///
    /// A candidate is promoted when it references a legacy assembly, a module already
    /// headed for the relink pipeline, or a dependency that is removed or stubbed in this
    /// run. Each promotion can enable more, so the pass repeats until nothing changes.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] if a candidate is in an unexpected state.
    pub fn finalize<C: ModuleCodec>(
        &mut self,
        config: &RelinkConfig,
        codec: &C,
        report: &mut RunReport,
    ) -> Result<()> {
        loop {
            let relinked: HashSet<String> = self
                .entries
                .iter()
                .filter(|entry| entry.role == ModuleRole::Ordinary)
                .map(|entry| entry.name.clone())
                .collect();

            let promote: Vec<usize> = self
                .entries
                .iter()
                .filter(|entry| entry.role == ModuleRole::Candidate)
                .filter(|entry| {
                    entry.module.as_ref().is_some_and(|module| {
                        module.reference_names().any(|name| {
                            config.is_legacy_source(name)
                                || relinked.contains(name)
                                || self.is_removed_dependency(name)
                                || self.is_stubbed(name)
                        })
                    })
                })
                .map(|entry| entry.id.0)
                .collect();

            if promote.is_empty() {
                break;
            }

            for index in promote {
                let entry = &mut self.entries[index];
                log::info!("[ScanPath] Relinking {} (depends on a relinked module)", entry.name);
                entry.role = ModuleRole::Ordinary;
                entry.transition(ModuleState::Classified)?;
            }
        }

        for index in 0..self.entries.len() {
            if self.entries[index].role != ModuleRole::Candidate {
                continue;
            }

            let entry = &mut self.entries[index];
            entry.transition(ModuleState::Skipped)?;
            report.record(
                entry.name.clone(),
                entry.path.clone(),
                ModuleAction::Skipped(SkipReason::NoLegacyReferences),
            );
            self.mark_released(ModuleId(index), codec)?;
        }

        Ok(())
    }

    /// Take module `id` out of the catalog for mutation by `stage`.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyLeased`] if another stage holds the module, and
    /// [`Error::InvalidTransition`] if the module already finished its pass.
    pub fn acquire(&mut self, id: ModuleId, stage: Stage) -> Result<Module> {
        let entry = self.entry_mut(id)?;

        if let Some(holder) = entry.lease {
            return Err(Error::AlreadyLeased {
                module: entry.name.clone(),
                holder,
            });
        }

        if entry.module.is_none() && !entry.state.is_terminal() {
            return Err(Error::ModuleNotFound(entry.name.clone()));
        }

        entry.transition(ModuleState::Leased)?;
        let module = entry
            .module
            .take()
            .ok_or_else(|| Error::ModuleNotFound(entry.name.clone()))?;
        entry.lease = Some(stage);
        Ok(module)
    }

    /// End `stage`'s lease on module `id` with `outcome`.
    ///
    /// The stage keeps ownership of the module handle and must close it before calling
    /// [`ModuleCatalog::mark_released`].
    ///
    /// # Errors
    /// Returns [`Error::NotLeased`] if `stage` does not hold the lease.
    pub fn complete(&mut self, id: ModuleId, stage: Stage, outcome: ModuleState) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.lease != Some(stage) {
            return Err(Error::NotLeased(entry.name.clone()));
        }

        entry.transition(outcome)?;
        entry.lease = None;
        Ok(())
    }

    /// Drop `stage`'s lease on module `id` after a failure, closing `module`.
    ///
    /// # Errors
    /// Returns [`Error::NotLeased`] if `stage` does not hold the lease.
    pub fn abandon<C: ModuleCodec>(
        &mut self,
        id: ModuleId,
        stage: Stage,
        module: Module,
        codec: &C,
    ) -> Result<()> {
        codec.release(module);

        let entry = self.entry_mut(id)?;
        if entry.lease != Some(stage) {
            return Err(Error::NotLeased(entry.name.clone()));
        }
        entry.lease = None;
        entry.transition(ModuleState::Released)
    }

    /// Close module `id` for good.
    ///
    /// A module still held open by the catalog is handed to the codec. Afterwards the
    /// module can only be re-opened read-only through a [`CatalogResolver`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] if the module cannot be released from its
    /// current state, including while it is leased.
    pub fn mark_released<C: ModuleCodec>(&mut self, id: ModuleId, codec: &C) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.lease.is_some() {
            return Err(Error::InvalidTransition {
                module: entry.name.clone(),
                from: entry.state,
                to: ModuleState::Released,
            });
        }

        entry.transition(ModuleState::Released)?;
        if let Some(module) = entry.module.take() {
            codec.release(module);
        }
        Ok(())
    }

    /// Record that module `id` is left out of the relink pass.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransition`] if the module was already processed.
    pub fn skip(&mut self, id: ModuleId) -> Result<()> {
        self.entry_mut(id)?.transition(ModuleState::Skipped)
    }

    /// Close every module that is still open, and every lookup re-open.
    pub fn release_all<C: ModuleCodec>(&mut self, codec: &C) {
        self.clear_reopened(codec);

        for entry in &mut self.entries {
            if entry.state.is_terminal() || entry.lease.is_some() {
                continue;
            }
            if let Some(module) = entry.module.take() {
                codec.release(module);
            }
            // Candidates of a run that never finalized
            if entry.state == ModuleState::Discovered {
                entry.state = ModuleState::Skipped;
            }
            if entry.state.can_transition_to(ModuleState::Released) {
                entry.state = ModuleState::Released;
            }
        }
    }

    /// Close the modules re-opened for dependency lookups.
    pub fn clear_reopened<C: ModuleCodec>(&mut self, codec: &C) {
        for (_, module) in self.reopened.drain() {
            codec.release(module);
        }
    }

    /// Open module named `name`, whether held by the catalog or re-opened for lookups.
    #[must_use]
    pub fn live_module(&self, name: &str) -> Option<&Module> {
        self.get(name)
            .and_then(CatalogEntry::module)
            .or_else(|| self.reopened.get(name))
    }

    fn entry_mut(&mut self, id: ModuleId) -> Result<&mut CatalogEntry> {
        self.entries
            .get_mut(id.0)
            .ok_or_else(|| Error::ModuleNotFound(id.to_string()))
    }

    fn register(
        &mut self,
        name: String,
        path: PathBuf,
        role: ModuleRole,
        module: Option<Module>,
    ) -> ModuleId {
        let id = ModuleId(self.entries.len());
        self.by_name.insert(name.clone(), id);
        self.entries.push(CatalogEntry {
            id,
            name,
            path,
            role,
            state: ModuleState::Discovered,
            lease: None,
            module,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryStore,
        test::factories::{legacy_game, mixed_module, module_with_refs, target_module},
    };

    fn catalog_with(modules: &[(ModuleRole, Module)]) -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new(&RelinkConfig::stock(), "Relink");
        for (role, module) in modules {
            let name = module.name().to_string();
            let path = PathBuf::from(format!("/g/{}.dll", name));
            let id = catalog.register(name, path, *role, Some(module.clone()));
            if *role != ModuleRole::Candidate {
                catalog.entries[id.0].state = ModuleState::Classified;
            }
        }
        catalog
    }

    #[test]
    fn test_lease_is_exclusive() {
        let mut catalog = catalog_with(&[(ModuleRole::Ordinary, legacy_game("Game"))]);
        let id = ModuleId(0);

        let module = catalog.acquire(id, Stage::Relink).unwrap();
        assert_eq!(catalog.entry(id).unwrap().lease(), Some(Stage::Relink));
        assert!(catalog.live_module("Game").is_none());

        let err = catalog.acquire(id, Stage::Stub).unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyLeased {
                holder: Stage::Relink,
                ..
            }
        ));

        assert!(matches!(
            catalog.complete(id, Stage::Stub, ModuleState::Stubbed),
            Err(Error::NotLeased(_))
        ));

        let store = MemoryStore::new();
        store.release(module);
        catalog.complete(id, Stage::Relink, ModuleState::Relinked).unwrap();
        catalog.mark_released(id, &store).unwrap();
        assert_eq!(catalog.entry(id).unwrap().state(), ModuleState::Released);

        // Released modules never come back for mutation
        assert!(matches!(
            catalog.acquire(id, Stage::Relink),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_abandon_releases_lease() {
        let store = MemoryStore::new();
        let mut catalog = catalog_with(&[(ModuleRole::Ordinary, legacy_game("Game"))]);

        let module = catalog.acquire(ModuleId(0), Stage::Relink).unwrap();
        catalog
            .abandon(ModuleId(0), Stage::Relink, module, &store)
            .unwrap();

        let entry = catalog.entry(ModuleId(0)).unwrap();
        assert_eq!(entry.state(), ModuleState::Released);
        assert_eq!(entry.lease(), None);
        assert_eq!(store.releases().len(), 1);
    }

    #[test]
    fn test_finalize_promotes_to_fixpoint() {
        let store = MemoryStore::new();
        let mut report = RunReport::new();
        // C -> B -> A -> legacy, discovered in reverse so a single pass is not enough
        let mut catalog = catalog_with(&[
            (ModuleRole::Candidate, module_with_refs("C", &["B"])),
            (ModuleRole::Candidate, module_with_refs("B", &["A"])),
            (ModuleRole::Ordinary, legacy_game("A")),
            (ModuleRole::Candidate, module_with_refs("Tools", &["mscorlib"])),
        ]);

        catalog
            .finalize(&RelinkConfig::stock(), &store, &mut report)
            .unwrap();

        assert_eq!(catalog.get("C").unwrap().role(), ModuleRole::Ordinary);
        assert_eq!(catalog.get("B").unwrap().role(), ModuleRole::Ordinary);
        assert_eq!(catalog.get("C").unwrap().state(), ModuleState::Classified);

        let tools = catalog.get("Tools").unwrap();
        assert_eq!(tools.role(), ModuleRole::Candidate);
        assert_eq!(tools.state(), ModuleState::Released);
        assert!(tools.module().is_none());
        assert_eq!(
            report.action_of("Tools"),
            Some(ModuleAction::Skipped(SkipReason::NoLegacyReferences))
        );
    }

    #[test]
    fn test_finalize_promotes_dependents_of_stubs_and_removed_modules() {
        let store = MemoryStore::new();
        let mut report = RunReport::new();
        let mut catalog = catalog_with(&[
            (ModuleRole::Stub, mixed_module("Native")),
            (ModuleRole::Candidate, module_with_refs("Helper", &["mscorlib", "Native"])),
            (ModuleRole::Candidate, module_with_refs("Interop", &["Microsoft.VisualC"])),
            (ModuleRole::Candidate, module_with_refs("Tools", &["mscorlib"])),
        ]);

        catalog
            .finalize(&RelinkConfig::stock(), &store, &mut report)
            .unwrap();

        assert_eq!(catalog.get("Helper").unwrap().role(), ModuleRole::Ordinary);
        assert_eq!(catalog.get("Interop").unwrap().role(), ModuleRole::Ordinary);
        assert_eq!(catalog.get("Tools").unwrap().role(), ModuleRole::Candidate);
        assert_eq!(report.relinked_count(), 0);
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn test_scan_with_larger_mapping_table() {
        let store = MemoryStore::new();
        store.insert("/g/FNA.dll", target_module("FNA"));
        let mut report = RunReport::new();
        let mut catalog = ModuleCatalog::new(&RelinkConfig::empty(), "Relink");

        catalog
            .scan_path(Path::new("/g/FNA.dll"), &RelinkConfig::minimal(), &store, &mut report)
            .unwrap();

        let fna = catalog.get("FNA").unwrap().id();
        assert_eq!(catalog.resolved_target(1), Some(fna));
        assert!(!catalog.is_mapping_active(0));
    }

    #[test]
    fn test_active_mapping_prefers_table_order() {
        let config = RelinkConfig::stock();
        let mut catalog = ModuleCatalog::new(&config, "Relink");
        // Activate FNA.Steamworks (index 3) and MonoGame.Framework.Net (index 2)
        catalog.resolved_targets[3] = Some(ModuleId(0));
        assert_eq!(
            catalog
                .active_mapping_for(&config, "Microsoft.Xna.Framework.Net")
                .map(|(entry, _)| entry.target.as_str()),
            Some("FNA.Steamworks")
        );

        catalog.resolved_targets[2] = Some(ModuleId(1));
        assert_eq!(
            catalog
                .active_mapping_for(&config, "Microsoft.Xna.Framework.Net")
                .map(|(entry, id)| (entry.target.as_str(), id)),
            Some(("MonoGame.Framework.Net", ModuleId(1)))
        );
        assert!(catalog
            .active_mapping_for(&config, "Microsoft.Xna.Framework")
            .is_none());
    }
}
