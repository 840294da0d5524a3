//! Top-level orchestration of a relink run.
//!
//! An [`Engine`] owns the configuration, the codec and patcher backends, the engine's own
//! module and the [`ModuleCatalog`]. A run goes through three phases:
//!
//! 1. [`Engine::scan_paths`], any number of times, to discover modules
//! 2. [`Engine::relink_all`], exactly once, which finalizes the catalog, activates the
//!    mappings and runs their setup hooks, stubs mixed-mode modules and then relinks
//!    every ordinary module in dependency order
//! 3. [`Engine::finish`], which closes every handle still open and hands back the report
//!
//! The report is kept up to date as the run progresses, so [`Engine::report`] describes
//! everything decided so far even after `relink_all` failed.

use std::path::Path;

use crate::{
    catalog::ModuleCatalog,
    codec::{ModuleCodec, ReadMode, ReferencePatcher},
    config::RelinkConfig,
    module::Module,
    order::DependencyOrderer,
    relink::{register_module_remaps, run_setup_hooks, ReferenceRelinker, RemapTable},
    report::RunReport,
    stub::StubGenerator,
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scanning,
    Relinked,
}

/// Drives one relink run.
///
/// `C` reads and writes modules, `P` rewrites symbol usages in their bodies. Both may be
/// handles onto the same backend, as with [`crate::memory::MemoryStore`].
pub struct Engine<C: ModuleCodec, P: ReferencePatcher> {
    config: RelinkConfig,
    codec: C,
    patcher: P,
    engine: Module,
    catalog: ModuleCatalog,
    report: RunReport,
    phase: Phase,
}

impl<C: ModuleCodec, P: ReferencePatcher> Engine<C, P> {
    /// Load the engine's own module from `config.engine_module` and prepare an empty
    /// catalog.
    ///
    /// # Errors
    /// Returns [`Error::EngineModule`] if the engine module cannot be read.
    pub fn new(config: RelinkConfig, codec: C, patcher: P) -> Result<Self> {
        let engine = codec
            .read_module(&config.engine_module, ReadMode::ReadOnly)
            .map_err(|error| Error::EngineModule {
                path: config.engine_module.clone(),
                message: error.to_string(),
            })?;

        log::info!(
            "[Engine] Loaded engine module {} from {}",
            engine.assembly,
            config.engine_module.display()
        );
        let catalog = ModuleCatalog::new(&config, engine.name());

        Ok(Self {
            config,
            codec,
            patcher,
            engine,
            catalog,
            report: RunReport::new(),
            phase: Phase::Scanning,
        })
    }

    /// Scan directories and module files.
    ///
    /// # Errors
    /// Returns an error if called after [`Engine::relink_all`], or if restoring a backup
    /// or deploying engine files fails.
    pub fn scan_paths<S: AsRef<Path>>(&mut self, paths: &[S]) -> Result<()> {
        if self.phase != Phase::Scanning {
            return Err(Error::Error(
                "Cannot scan after the relink pass has started".to_string(),
            ));
        }

        for path in paths {
            self.catalog
                .scan_path(path.as_ref(), &self.config, &self.codec, &mut self.report)?;
        }
        Ok(())
    }

    /// Run the relink pass over everything scanned so far.
    ///
    /// # Errors
    /// Lease violations, patcher failures and write failures abort the run. The report
    /// is still available through [`Engine::report`]. The pass cannot be retried.
    pub fn relink_all(&mut self) -> Result<&RunReport> {
        if self.phase != Phase::Scanning {
            return Err(Error::Error("The relink pass already ran".to_string()));
        }
        self.phase = Phase::Relinked;

        self.catalog
            .finalize(&self.config, &self.codec, &mut self.report)?;

        let mut remaps = RemapTable::new();
        register_module_remaps(&self.config, &self.catalog, &mut remaps);
        run_setup_hooks(&self.config, &self.catalog, &mut remaps);
        log::debug!("[Relink] Registering {} symbol remaps", remaps.len());
        for (old, new) in remaps.iter() {
            self.patcher.register_symbol_remap(old.clone(), new.clone());
        }

        let stubs = StubGenerator::new(&self.config, &self.codec, &self.engine);
        for id in self.catalog.stub_ids() {
            stubs.stub(&mut self.catalog, id, &mut self.report)?;
        }

        let (ids, nodes) = self.catalog.order_nodes();
        let order = DependencyOrderer::new(nodes).order();

        let mut relinker =
            ReferenceRelinker::new(&self.config, &self.codec, &mut self.patcher, &self.engine);
        for index in order {
            relinker.relink(&mut self.catalog, ids[index], &mut self.report)?;
        }

        log::info!(
            "[Engine] Relinked {} modules, stubbed {}",
            self.report.relinked_count(),
            self.report.stubbed_count()
        );
        Ok(&self.report)
    }

    /// Outcomes recorded so far.
    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// The module catalog.
    #[must_use]
    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &RelinkConfig {
        &self.config
    }

    /// The engine's own module.
    #[must_use]
    pub fn engine_module(&self) -> &Module {
        &self.engine
    }

    /// Close every handle still open and return the report.
    pub fn finish(mut self) -> RunReport {
        self.catalog.release_all(&self.codec);
        self.codec.release(self.engine);
        self.report
    }
}
