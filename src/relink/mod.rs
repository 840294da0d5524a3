//! The per-module relink pipeline.
//!
//! [`ReferenceRelinker`] drives one module at a time through
//!
//! ```text
//! Skip -> Done                                                  (targets, stubs, engine)
//! Acquire -> PatchReferences -> PatchBody -> PatchAttributes
//!         -> InjectHook -> Write -> Release -> Done
//! ```
//!
//! and releases it before the next module is opened, so later modules can look it up as a
//! read-only dependency. A failure after Acquire drops the lease, closes the module and
//! aborts the run; nothing is half-written.
//!
//! # Module Structure
//!
//! - [`references`] - the reference rewriting rules
//! - [`attributes`] - strong-name, platform and unsafe-code attribute fixes
//! - [`hooks`] - body remaps derived from the active mappings and their setup hooks

use std::{fmt, path::Path};

use crate::{
    catalog::{CatalogResolver, ModuleCatalog, ModuleId, ModuleRole, ModuleState, Stage},
    codec::{ExternalMethod, ModuleCodec, ReferencePatcher},
    config::RelinkConfig,
    module::Module,
    report::{ModuleAction, RunReport, SkipReason},
    Error, Result,
};

pub mod attributes;
pub mod hooks;
pub mod references;

pub use attributes::{apply_platform, patch_attributes};
pub use hooks::{register_module_remaps, run_setup_hooks, RemapTable};
pub use references::patch_references;

/// Read-only view of the run state shared by the rewriting rules.
#[derive(Clone, Copy)]
pub struct RelinkContext<'a> {
    /// Run configuration
    pub config: &'a RelinkConfig,
    /// The catalog, for mapping activation, removal and stub lookups
    pub catalog: &'a ModuleCatalog,
    /// The engine's own module
    pub engine: &'a Module,
}

impl<'a> RelinkContext<'a> {
    /// Bundle the shared run state.
    #[must_use]
    pub fn new(config: &'a RelinkConfig, catalog: &'a ModuleCatalog, engine: &'a Module) -> Self {
        Self {
            config,
            catalog,
            engine,
        }
    }
}

/// Steps of the relink pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelinkStep {
    /// Not processed
    Skip,
    /// Take the mutation lease
    Acquire,
    /// Rewrite the reference list
    PatchReferences,
    /// Rewrite symbol usages in the body
    PatchBody,
    /// Fix module attributes
    PatchAttributes,
    /// Call the entry hook from the entry point
    InjectHook,
    /// Serialize back to storage
    Write,
    /// Drop the lease and close the handle
    Release,
    /// Finished
    Done,
}

impl fmt::Display for RelinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Relinks ordinary modules one at a time.
pub struct ReferenceRelinker<'a, C: ModuleCodec, P: ReferencePatcher> {
    config: &'a RelinkConfig,
    codec: &'a C,
    patcher: &'a mut P,
    engine: &'a Module,
    hook: Option<ExternalMethod>,
}

impl<'a, C: ModuleCodec, P: ReferencePatcher> ReferenceRelinker<'a, C, P> {
    /// Create a relinker for one run.
    pub fn new(config: &'a RelinkConfig, codec: &'a C, patcher: &'a mut P, engine: &'a Module) -> Self {
        let hook = config.entry_hook.as_ref().map(|hook| ExternalMethod {
            module: engine.name().to_string(),
            declaring_type: hook.declaring_type.clone(),
            name: hook.name.clone(),
        });

        Self {
            config,
            codec,
            patcher,
            engine,
            hook,
        }
    }

    /// Run module `id` through the pipeline and record the outcome.
    ///
    /// # Errors
    /// Lease violations, patcher failures and write failures are returned and must abort
    /// the run. The module's lease is dropped and its handle closed first.
    pub fn relink(
        &mut self,
        catalog: &mut ModuleCatalog,
        id: ModuleId,
        report: &mut RunReport,
    ) -> Result<RelinkStep> {
        let entry = catalog
            .entry(id)
            .ok_or_else(|| Error::ModuleNotFound(id.to_string()))?;
        let name = entry.name().to_string();
        let path = entry.path().to_path_buf();

        let skip = match entry.role() {
            ModuleRole::Ordinary => None,
            ModuleRole::MappingTarget => Some(Some(SkipReason::MappingTarget)),
            ModuleRole::Engine => Some(Some(SkipReason::EngineModule)),
            // Stubs, removed and kept modules are reported by their own stage
            _ => Some(None),
        };
        if let Some(reason) = skip {
            log::debug!("[Relink] {} {}", RelinkStep::Skip, name);
            if let Some(reason) = reason {
                report.record(name, path, ModuleAction::Skipped(reason));
            }
            return Ok(RelinkStep::Skip);
        }

        log::info!("[Relink] Relinking {}", name);
        log::debug!("[Relink] {} {}", RelinkStep::Acquire, name);
        let mut module = catalog.acquire(id, Stage::Relink)?;

        if let Err(error) = self.rewrite(&mut module, catalog, &path) {
            log::warn!("[Relink] Aborting on {}: {}", name, error);
            catalog.abandon(id, Stage::Relink, module, self.codec)?;
            catalog.clear_reopened(self.codec);
            return Err(error);
        }

        log::debug!("[Relink] {} {}", RelinkStep::Release, name);
        catalog.complete(id, Stage::Relink, ModuleState::Relinked)?;
        self.codec.release(module);
        catalog.mark_released(id, self.codec)?;
        catalog.clear_reopened(self.codec);

        report.record(name, path, ModuleAction::Relinked);
        Ok(RelinkStep::Done)
    }

    fn rewrite(&mut self, module: &mut Module, catalog: &mut ModuleCatalog, path: &Path) -> Result<()> {
        log::debug!("[Relink] {} {}", RelinkStep::PatchReferences, module.name());
        references::patch_references(
            module,
            &RelinkContext::new(self.config, catalog, self.engine),
            "Relink",
        )?;

        log::debug!("[Relink] {} {}", RelinkStep::PatchBody, module.name());
        {
            let mut resolver = CatalogResolver::new(catalog, self.codec, self.engine);
            self.patcher.apply_pending_remaps(module, &mut resolver)?;
        }

        log::debug!("[Relink] {} {}", RelinkStep::PatchAttributes, module.name());
        attributes::patch_attributes(
            module,
            &RelinkContext::new(self.config, catalog, self.engine),
            "Relink",
            false,
        );

        if let (Some(hook), Some(entry_point)) = (&self.hook, &module.entry_point) {
            log::info!(
                "[Relink] {} {} into {}::{}",
                RelinkStep::InjectHook,
                hook,
                entry_point.declaring_type,
                entry_point.name
            );
            self.patcher.inject_call_at_entry(module, hook)?;
        }

        log::debug!("[Relink] {} {}", RelinkStep::Write, module.name());
        log::info!("[Relink] Rewriting {} to {}", module.name(), path.display());
        self.codec
            .write_module(module, path)
            .map_err(|error| Error::WriteFailed {
                module: module.name().to_string(),
                path: path.to_path_buf(),
                message: error.to_string(),
            })
    }
}
