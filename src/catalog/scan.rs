//! Path scanning and first-pass classification.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    catalog::{
        backup::{deploy_engine_files, is_engine_directory, restore_backup},
        ModuleCatalog, ModuleId, ModuleRole, ModuleState,
    },
    codec::{ModuleCodec, ReadMode},
    config::{MixedDependencyAction, RelinkConfig},
    module::Module,
    report::{ModuleAction, RunReport, SkipReason},
    Result,
};

impl ModuleCatalog {
    /// Scan a directory or a single module file.
    ///
    /// Directories are registered for dependency lookups and their files scanned in
    /// sorted order; subdirectories are not descended. Registering the same directory
    /// twice is a no-op. Files that are not modules, or fail to load, are skipped with a
    /// diagnostic.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if restoring a backup or deploying engine
    /// files fails, or a directory cannot be listed.
    pub fn scan_path<C: ModuleCodec>(
        &mut self,
        path: &Path,
        config: &RelinkConfig,
        codec: &C,
        report: &mut RunReport,
    ) -> Result<()> {
        if path.is_dir() {
            return self.scan_directory(path, config, codec, report);
        }

        self.scan_file(path, config, codec, report)
    }

    fn scan_directory<C: ModuleCodec>(
        &mut self,
        dir: &Path,
        config: &RelinkConfig,
        codec: &C,
        report: &mut RunReport,
    ) -> Result<()> {
        if self.directories.iter().any(|known| known == dir) {
            return Ok(());
        }

        if config.restore_backups {
            restore_backup(dir)?;
        }

        log::info!("[ScanPath] Scanning directory {}", dir.display());
        self.directories.push(dir.to_path_buf());

        if config.deploy_engine_files && !is_engine_directory(dir, &self.engine_path) {
            deploy_engine_files(dir, &self.engine_path, &config.runtime_binary)?;
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for file in files {
            self.scan_file(&file, config, codec, report)?;
        }
        Ok(())
    }

    fn scan_file<C: ModuleCodec>(
        &mut self,
        path: &Path,
        config: &RelinkConfig,
        codec: &C,
        report: &mut RunReport,
    ) -> Result<()> {
        if !config.is_module_candidate(path) {
            return Ok(());
        }

        let name = match codec.identify(path) {
            Ok(name) => name,
            Err(error) => {
                log::debug!("[ScanPath] Skipping {}: {}", path.display(), error);
                return Ok(());
            }
        };

        if let Some(existing) = self.get(&name) {
            log::warn!(
                "[ScanPath] WARNING: {} already loaded from {}, ignoring {}",
                name,
                existing.path().display(),
                path.display()
            );
            report.record(name, path, ModuleAction::Skipped(SkipReason::DuplicateName));
            return Ok(());
        }

        let is_target = config.is_mapping_target(&name);
        let is_engine = name == self.engine_name;
        let mode = if is_target || is_engine {
            ReadMode::ReadOnly
        } else {
            ReadMode::ReadWrite
        };

        log::info!(
            "[ScanPath] Checking assembly {} ({})",
            name,
            if mode.is_writable() { "rw" } else { "r-" }
        );

        let module = match codec.read_module(path, mode) {
            Ok(module) => module,
            Err(error) => {
                log::warn!("[ScanPath] WARNING: Cannot load assembly {}: {}", name, error);
                report.record(name, path, ModuleAction::Skipped(SkipReason::LoadFailed));
                return Ok(());
            }
        };

        if is_target {
            self.add_mapping_target(name, path, module, config)?;
        } else if is_engine {
            self.add_classified(name, path, ModuleRole::Engine, module)?;
        } else if !module.is_pure_managed() {
            self.add_mixed(name, path, module, config, codec, report)?;
        } else if module
            .reference_names()
            .any(|reference| config.is_legacy_source(reference))
        {
            log::info!("[ScanPath] Relinking {}", name);
            self.add_classified(name, path, ModuleRole::Ordinary, module)?;
        } else {
            self.register(name, path.to_path_buf(), ModuleRole::Candidate, Some(module));
        }
        Ok(())
    }

    fn add_classified(
        &mut self,
        name: String,
        path: &Path,
        role: ModuleRole,
        module: Module,
    ) -> Result<ModuleId> {
        let id = self.register(name, path.to_path_buf(), role, Some(module));
        self.entries[id.0].transition(ModuleState::Classified)?;
        Ok(id)
    }

    fn add_mapping_target(
        &mut self,
        name: String,
        path: &Path,
        module: Module,
        config: &RelinkConfig,
    ) -> Result<()> {
        let id = self.add_classified(name.clone(), path, ModuleRole::MappingTarget, module)?;

        if self.resolved_targets.len() < config.mappings.len() {
            self.resolved_targets.resize(config.mappings.len(), None);
        }

        for (index, entry) in config.mappings.iter().enumerate() {
            let Some(resolved) = self.resolved_targets.get_mut(index) else {
                continue;
            };
            if entry.target != name || resolved.is_some() {
                continue;
            }

            *resolved = Some(id);
            for source in entry.sources.iter().filter(|source| **source != name) {
                log::info!("[ScanPath] Mapping {} -> {}", source, name);
            }
        }
        Ok(())
    }

    fn add_mixed<C: ModuleCodec>(
        &mut self,
        name: String,
        path: &Path,
        module: Module,
        config: &RelinkConfig,
        codec: &C,
        report: &mut RunReport,
    ) -> Result<()> {
        log::warn!("[ScanPath] WARNING: Cannot handle mixed mode assembly {}", name);

        let (role, action) = match config.mixed_dependencies {
            MixedDependencyAction::Stub => {
                self.add_classified(name, path, ModuleRole::Stub, module)?;
                return Ok(());
            }
            MixedDependencyAction::Remove => {
                self.remove_names.insert(name.clone());
                (ModuleRole::Removed, ModuleAction::Removed)
            }
            MixedDependencyAction::Keep => (ModuleRole::Kept, ModuleAction::Kept),
        };

        codec.release(module);
        let id = self.register(name.clone(), path.to_path_buf(), role, None);
        let entry = &mut self.entries[id.0];
        entry.transition(ModuleState::Skipped)?;
        entry.transition(ModuleState::Released)?;
        report.record(name, path, action);
        Ok(())
    }
}
