//! Replacement of mixed-mode modules by empty managed stubs.
//!
//! A module carrying native code cannot be relinked. Under the stub policy it is rewritten
//! in place as a purely managed module with the same identity and no types, so that
//! references to it still bind.

use crate::{
    catalog::{ModuleCatalog, ModuleId, ModuleRole, ModuleState, Stage},
    codec::ModuleCodec,
    config::RelinkConfig,
    module::{Module, ModuleAttributes},
    relink::{patch_attributes, patch_references, RelinkContext},
    report::{ModuleAction, RunReport},
    Error, Result,
};

/// Rewrites stub-classified modules before any module is relinked.
pub struct StubGenerator<'a, C: ModuleCodec> {
    config: &'a RelinkConfig,
    codec: &'a C,
    engine: &'a Module,
}

impl<'a, C: ModuleCodec> StubGenerator<'a, C> {
    /// Create a generator for one run.
    pub fn new(config: &'a RelinkConfig, codec: &'a C, engine: &'a Module) -> Self {
        Self {
            config,
            codec,
            engine,
        }
    }

    /// Replace module `id` by a stub and write it back to its own path.
    ///
    /// Modules not classified as stubs are left alone.
    ///
    /// # Errors
    /// Returns [`Error::WriteFailed`] if the stub cannot be written, or a lease error. The
    /// lease is dropped before returning.
    pub fn stub(&self, catalog: &mut ModuleCatalog, id: ModuleId, report: &mut RunReport) -> Result<()> {
        let entry = catalog
            .entry(id)
            .ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
        if entry.role() != ModuleRole::Stub {
            return Ok(());
        }
        let name = entry.name().to_string();
        let path = entry.path().to_path_buf();

        log::info!("[Stub] Stubbing {}", name);
        let mut module = catalog.acquire(id, Stage::Stub)?;

        let result = self.rewrite(&mut module, catalog).and_then(|()| {
            log::info!("[Stub] Rewriting {} to {}", name, path.display());
            self.codec
                .write_module(&module, &path)
                .map_err(|error| Error::WriteFailed {
                    module: name.clone(),
                    path: path.clone(),
                    message: error.to_string(),
                })
        });

        if let Err(error) = result {
            log::warn!("[Stub] Aborting on {}: {}", name, error);
            catalog.abandon(id, Stage::Stub, module, self.codec)?;
            return Err(error);
        }

        catalog.complete(id, Stage::Stub, ModuleState::Stubbed)?;
        self.codec.release(module);
        catalog.mark_released(id, self.codec)?;
        report.record(name, path, ModuleAction::Stubbed);
        Ok(())
    }

    fn rewrite(&self, module: &mut Module, catalog: &ModuleCatalog) -> Result<()> {
        module.types.clear();
        module.type_references.clear();
        module.entry_point = None;
        module.attributes.insert(ModuleAttributes::IL_ONLY);
        module.assembly.clear_strong_name();

        let ctx = RelinkContext::new(self.config, catalog, self.engine);
        patch_references(module, &ctx, "Stub")?;
        patch_attributes(module, &ctx, "Stub", true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryStore,
        relink::attributes::UNVERIFIABLE_CODE_ATTRIBUTE,
        test::factories::{engine_module, mixed_module, scan_fixture},
    };

    #[test]
    fn test_stub_is_managed_and_empty() {
        let config = RelinkConfig::minimal();
        let store = MemoryStore::new();
        store.insert("/g/Native.dll", mixed_module("Native"));
        let mut catalog = scan_fixture(&config, &store, &["FNA"], &["/g/Native.dll"]);
        let engine = engine_module();
        let mut report = RunReport::new();

        let id = catalog.get("Native").unwrap().id();
        StubGenerator::new(&config, &store, &engine)
            .stub(&mut catalog, id, &mut report)
            .unwrap();

        let stub = store.module("/g/Native.dll").unwrap();
        assert!(stub.is_pure_managed());
        assert!(stub.types.is_empty());
        assert!(stub.entry_point.is_none());
        assert!(stub.public_key_token().is_empty());
        assert_eq!(stub.module_attributes, vec![UNVERIFIABLE_CODE_ATTRIBUTE]);
        // Legacy references are relinked like any other module
        assert!(stub.references_name("FNA"));
        assert!(!stub.references_name("Microsoft.Xna.Framework"));

        assert_eq!(catalog.entry(id).unwrap().state(), ModuleState::Released);
        assert_eq!(report.action_of("Native"), Some(ModuleAction::Stubbed));
    }

    #[test]
    fn test_non_stub_modules_are_ignored() {
        let config = RelinkConfig::minimal();
        let store = MemoryStore::new();
        let mut catalog = scan_fixture(&config, &store, &["FNA"], &[]);
        let engine = engine_module();
        let mut report = RunReport::new();

        let id = catalog.get("FNA").unwrap().id();
        StubGenerator::new(&config, &store, &engine)
            .stub(&mut catalog, id, &mut report)
            .unwrap();

        assert!(store.writes().is_empty());
        assert!(report.is_empty());
    }

    #[test]
    fn test_write_failure_drops_lease() {
        let config = RelinkConfig::minimal();
        let store = MemoryStore::new();
        store.insert("/g/Native.dll", mixed_module("Native"));
        let mut catalog = scan_fixture(&config, &store, &[], &["/g/Native.dll"]);
        store.fail_writes_to("/g/Native.dll");
        let engine = engine_module();
        let mut report = RunReport::new();

        let id = catalog.get("Native").unwrap().id();
        let err = StubGenerator::new(&config, &store, &engine)
            .stub(&mut catalog, id, &mut report)
            .unwrap_err();

        assert!(matches!(err, Error::WriteFailed { .. }));
        assert_eq!(catalog.entry(id).unwrap().lease(), None);
        assert_eq!(store.releases().len(), 1);
    }
}
