//! In-memory codec and patcher backend.
//!
//! [`MemoryStore`] keeps modules keyed by path and implements both [`ModuleCodec`] and
//! [`ReferencePatcher`] over them. Clones share the same state, so one store can serve as
//! codec and patcher of an [`crate::Engine`] at once while the caller keeps a handle to
//! inspect what was read, written and released.
//!
//! Body patching is modelled on the module's type references: every reference whose
//! scope (or scope and type) has a registered remap is rewritten, and each new scope is
//! resolved through the [`DependencyResolver`] like a real patcher would.
//!
//! # Examples
//!
//! ```rust
//! use asmrelink::prelude::*;
//! use std::path::Path;
//!
//! let store = MemoryStore::new();
//! store.insert("/g/Game.exe", Module::new("Game", AssemblyVersion::new(1, 0, 0, 0)));
//!
//! assert_eq!(store.identify(Path::new("/g/Game.exe"))?, "Game");
//! let game = store.read_module(Path::new("/g/Game.exe"), ReadMode::ReadWrite)?;
//! store.release(game);
//! assert_eq!(store.releases(), vec!["Game".to_string()]);
//! # Ok::<(), asmrelink::Error>(())
//! ```

use std::{
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use crate::{
    codec::{DependencyResolver, ExternalMethod, ModuleCodec, ReadMode, ReferencePatcher, Symbol},
    module::{Module, TypeReference},
    relink::RemapTable,
    Error, Result,
};

#[derive(Debug, Default)]
struct StoreState {
    modules: HashMap<PathBuf, Module>,
    failing_writes: HashSet<PathBuf>,
    reads: Vec<(PathBuf, ReadMode)>,
    writes: Vec<PathBuf>,
    releases: Vec<String>,
    remaps: RemapTable,
    injections: Vec<(String, ExternalMethod)>,
    unresolved: Vec<(String, String)>,
}

/// Shared in-memory module storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `module` at `path`, replacing whatever was there.
    pub fn insert(&self, path: impl AsRef<Path>, module: Module) {
        let destination = path.as_ref().to_path_buf();
        if let Err(error) = with_write!(self.state, |state: &mut StoreState| {
            state.modules.insert(destination, module)
        }) {
            log::warn!("[MemoryStore] Cannot store {}: {}", path.as_ref().display(), error);
        }
    }

    /// Make every later write to `path` fail.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        let destination = path.as_ref().to_path_buf();
        if let Err(error) = with_write!(self.state, |state: &mut StoreState| {
            state.failing_writes.insert(destination)
        }) {
            log::warn!(
                "[MemoryStore] Cannot mark {} as failing: {}",
                path.as_ref().display(),
                error
            );
        }
    }

    /// The module currently stored at `path`.
    #[must_use]
    pub fn module(&self, path: impl AsRef<Path>) -> Option<Module> {
        let path = path.as_ref();
        with_read!(self.state, |state: &StoreState| state.modules.get(path).cloned())
            .ok()
            .flatten()
    }

    /// Successful reads, in order.
    #[must_use]
    pub fn reads(&self) -> Vec<(PathBuf, ReadMode)> {
        with_read!(self.state, |state: &StoreState| state.reads.clone()).unwrap_or_default()
    }

    /// Paths written, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<PathBuf> {
        with_read!(self.state, |state: &StoreState| state.writes.clone()).unwrap_or_default()
    }

    /// Names of the modules handed back, in order.
    #[must_use]
    pub fn releases(&self) -> Vec<String> {
        with_read!(self.state, |state: &StoreState| state.releases.clone()).unwrap_or_default()
    }

    /// Registered symbol remaps, in registration order.
    #[must_use]
    pub fn remaps(&self) -> Vec<(Symbol, Symbol)> {
        with_read!(self.state, |state: &StoreState| {
            state.remaps.iter().cloned().collect::<Vec<_>>()
        })
        .unwrap_or_default()
    }

    /// Entry hook injections as `(module, hook)`, in order.
    #[must_use]
    pub fn injections(&self) -> Vec<(String, ExternalMethod)> {
        with_read!(self.state, |state: &StoreState| state.injections.clone()).unwrap_or_default()
    }

    /// Dependencies the resolver could not provide, as `(requester, name)`.
    #[must_use]
    pub fn unresolved(&self) -> Vec<(String, String)> {
        with_read!(self.state, |state: &StoreState| state.unresolved.clone()).unwrap_or_default()
    }
}

impl ModuleCodec for MemoryStore {
    fn identify(&self, path: &Path) -> Result<String> {
        let state = read_lock!(self.state)?;
        state
            .modules
            .get(path)
            .map(|module| module.name().to_string())
            .ok_or_else(|| Error::Codec(format!("{} is not a module", path.display())))
    }

    fn read_module(&self, path: &Path, mode: ReadMode) -> Result<Module> {
        let mut state = write_lock!(self.state)?;
        let module = state
            .modules
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Codec(format!("{} not found", path.display())))?;
        state.reads.push((path.to_path_buf(), mode));
        Ok(module)
    }

    fn write_module(&self, module: &Module, destination: &Path) -> Result<()> {
        let mut state = write_lock!(self.state)?;
        if state.failing_writes.contains(destination) {
            return Err(Error::FileError(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", destination.display()),
            )));
        }

        state
            .modules
            .insert(destination.to_path_buf(), module.clone());
        state.writes.push(destination.to_path_buf());
        Ok(())
    }

    fn release(&self, module: Module) {
        if let Ok(mut state) = write_lock!(self.state) {
            state.releases.push(module.name().to_string());
        }
    }
}

impl ReferencePatcher for MemoryStore {
    fn register_symbol_remap(&mut self, old: Symbol, new: Symbol) {
        if let Ok(mut state) = write_lock!(self.state) {
            state.remaps.register(old, new);
        }
    }

    fn apply_pending_remaps(
        &mut self,
        module: &mut Module,
        resolver: &mut dyn DependencyResolver,
    ) -> Result<()> {
        let remaps = read_lock!(self.state)?.remaps.clone();
        let name = module.name().to_string();

        let mut scopes: Vec<(String, String)> = Vec::new();
        for reference in &mut module.type_references {
            let by_type = Symbol::type_in(reference.scope.clone(), reference.full_name.clone());
            let new_scope = match remaps.get(&by_type) {
                Some(Symbol::Type { module: target, .. } | Symbol::Module(target)) => {
                    Some(target.clone())
                }
                None => match remaps.get(&Symbol::Module(reference.scope.clone())) {
                    Some(Symbol::Module(target) | Symbol::Type { module: target, .. }) => {
                        Some(target.clone())
                    }
                    None => None,
                },
            };

            if let Some(scope) = new_scope {
                reference.scope = scope;
                if reference.scope != name && !scopes.iter().any(|(s, _)| *s == reference.scope) {
                    scopes.push((reference.scope.clone(), reference.full_name.clone()));
                }
            }
        }

        let mut unresolved = Vec::new();
        for (scope, full_name) in scopes {
            if resolver.resolve_missing(&name, &scope, &full_name).is_none() {
                unresolved.push((name.clone(), scope));
            }
        }
        write_lock!(self.state)?.unresolved.extend(unresolved);
        Ok(())
    }

    fn inject_call_at_entry(&mut self, module: &mut Module, hook: &ExternalMethod) -> Result<()> {
        if module.entry_point.is_none() {
            return Err(Error::Patch {
                module: module.name().to_string(),
                message: "module has no entry point".to_string(),
            });
        }

        let call = TypeReference::new(hook.module.clone(), hook.declaring_type.clone());
        if !module.type_references.contains(&call) {
            module.type_references.push(call);
        }

        let mut state = write_lock!(self.state)?;
        state
            .injections
            .push((module.name().to_string(), hook.clone()));
        Ok(())
    }
}
