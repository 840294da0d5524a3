//! Dependency lookups on behalf of the reference patcher.

use crate::{
    catalog::{ModuleCatalog, ModuleState},
    codec::{DependencyResolver, ModuleCodec, ReadMode},
    module::Module,
};

/// Resolves the modules a body depends on while it is being patched.
///
/// Lookups are answered, in order, by the engine module, by modules the catalog holds
/// open, by re-opening a released catalog module read-only, and finally by probing
/// `<name>.dll` and `<name>.exe` in every registered search directory. Modules re-opened
/// here stay cached until [`ModuleCatalog::clear_reopened`] runs after the module being
/// patched is released.
///
/// A module currently held under a lease is never handed out.
pub struct CatalogResolver<'a, C: ModuleCodec> {
    catalog: &'a mut ModuleCatalog,
    codec: &'a C,
    engine: &'a Module,
}

impl<'a, C: ModuleCodec> CatalogResolver<'a, C> {
    /// Create a resolver over `catalog`.
    pub fn new(catalog: &'a mut ModuleCatalog, codec: &'a C, engine: &'a Module) -> Self {
        Self {
            catalog,
            codec,
            engine,
        }
    }

    fn reopen(&self, name: &str) -> Option<Module> {
        if let Some(entry) = self.catalog.get(name) {
            if entry.state() == ModuleState::Leased {
                return None;
            }
            if entry.state().is_terminal() {
                if let Ok(module) = self.codec.read_module(entry.path(), ReadMode::ReadOnly) {
                    return Some(module);
                }
            }
        }

        self.catalog
            .search_directories()
            .iter()
            .flat_map(|dir| ["dll", "exe"].map(|ext| dir.join(format!("{}.{}", name, ext))))
            .find_map(|candidate| self.codec.read_module(&candidate, ReadMode::ReadOnly).ok())
    }
}

impl<C: ModuleCodec> DependencyResolver for CatalogResolver<'_, C> {
    fn resolve_missing(
        &mut self,
        requester: &str,
        name: &str,
        full_name: &str,
    ) -> Option<&Module> {
        if self.engine.name() == name {
            return Some(self.engine);
        }

        if self.catalog.live_module(name).is_none() {
            match self.reopen(name) {
                Some(module) => {
                    log::debug!("[Relink] Re-opened {} read-only for {}", name, requester);
                    self.catalog.reopened.insert(name.to_string(), module);
                }
                None => {
                    log::warn!(
                        "[Relink] Cannot map dependency {} -> (({}), ({})) - not found",
                        requester,
                        full_name,
                        name
                    );
                    return None;
                }
            }
        }

        self.catalog.live_module(name)
    }
}
