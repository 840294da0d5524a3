//! Relink configuration.
//!
//! A [`RelinkConfig`] is built once by the host and then passed by shared reference into
//! every stage of a run. No stage mutates it: state that changes during a run (which
//! mappings are active, which names were added to the removal set by the mixed-module
//! policy) lives in [`crate::catalog::ModuleCatalog`].
//!
//! # Presets
//!
//! - [`RelinkConfig::default`] / [`RelinkConfig::stock`] - the stock migration profile
//! - [`RelinkConfig::minimal`] - reference rewriting only, no hooks, no file deployment
//! - [`RelinkConfig::empty`] - no mappings and no policies, for building a profile from scratch
//!
//! ```rust
//! use asmrelink::config::{MixedDependencyAction, PlatformPreference, RelinkConfig};
//!
//! let config = RelinkConfig::default()
//!     .with_mixed_dependencies(MixedDependencyAction::Remove)
//!     .with_platform("x86".parse()?);
//!
//! assert_eq!(config.platform, PlatformPreference::X86);
//! assert!(config.mapping_for_source("Microsoft.Xna.Framework.Graphics").is_some());
//! # Ok::<(), strum::ParseError>(())
//! ```

use std::path::{Path, PathBuf};

use strum::{Display, EnumIter, EnumString};

use crate::module::TargetRuntime;

mod mapping;

pub use mapping::{MappingEntry, SetupHook, TypeRedirect, NETWORKING_NAMESPACES};

/// What to do with a module the codec reports as not purely managed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum MixedDependencyAction {
    /// Leave the module untouched and out of the relink pass
    Keep,
    /// Replace the module with an empty managed equivalent
    #[default]
    Stub,
    /// Drop the module and strip every reference to it
    Remove,
}

/// Architecture rewriting applied to every relinked module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum PlatformPreference {
    /// Leave architecture and 32-bit flags as they are
    #[default]
    Keep,
    /// Platform-neutral image
    AnyCpu,
    /// 32-bit only
    X86,
    /// 64-bit only
    X64,
    /// Platform-neutral image preferring a 32-bit process
    X86Preferred,
}

/// A static method the relinker can call from a module's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookMethod {
    /// Full name of the declaring type inside the engine module
    pub declaring_type: String,
    /// Method name
    pub name: String,
}

impl HookMethod {
    /// Create a hook method reference.
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }
}

/// Configuration for a relink run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RelinkConfig {
    /// Mapping table, consulted in order; the first active entry listing a name wins
    pub mappings: Vec<MappingEntry>,

    /// Reference names stripped from every relinked module
    pub remove_dependencies: Vec<String>,

    /// Module names whose public key token is zeroed wherever referenced
    pub destroy_public_key_tokens: Vec<String>,

    /// Policy for modules that are not purely managed
    pub mixed_dependencies: MixedDependencyAction,

    /// Architecture rewriting
    pub platform: PlatformPreference,

    /// Oldest runtime a relinked module may declare
    pub runtime_floor: TargetRuntime,

    /// Append a reference to the engine module when missing
    pub add_engine_reference: bool,

    /// Method called first thing from every entry point, `None` to disable injection
    pub entry_hook: Option<HookMethod>,

    /// Copy an `orig/` backup over its parent directory before scanning it
    pub restore_backups: bool,

    /// Copy the engine module and runtime binary into scanned directories
    pub deploy_engine_files: bool,

    /// File name of the replacement runtime binary deployed next to the engine
    pub runtime_binary: String,

    /// File extensions (without dot, lower case) considered module candidates
    pub module_extensions: Vec<String>,

    /// Location of the engine's own module
    pub engine_module: PathBuf,
}

impl Default for RelinkConfig {
    fn default() -> Self {
        Self::stock()
    }
}

impl RelinkConfig {
    /// The stock migration profile.
    #[must_use]
    pub fn stock() -> Self {
        Self {
            mappings: stock_mappings(),
            remove_dependencies: vec![
                String::new(),
                "Microsoft.DirectX.DirectInput".to_string(),
                "Microsoft.VisualC".to_string(),
            ],
            destroy_public_key_tokens: Vec::new(),
            mixed_dependencies: MixedDependencyAction::Stub,
            platform: PlatformPreference::Keep,
            runtime_floor: TargetRuntime::Net4_0,
            add_engine_reference: true,
            entry_hook: Some(HookMethod::new("RuntimeHelper", "MainHook")),
            restore_backups: true,
            deploy_engine_files: true,
            runtime_binary: "FNA.dll".to_string(),
            module_extensions: vec!["dll".to_string(), "exe".to_string()],
            engine_module: PathBuf::new(),
        }
    }

    /// Stock mappings and removal list only: no engine reference, no entry hook, no file
    /// copying.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            add_engine_reference: false,
            entry_hook: None,
            restore_backups: false,
            deploy_engine_files: false,
            ..Self::stock()
        }
    }

    /// A profile with no mappings, no removal rules and no side effects.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            mappings: Vec::new(),
            remove_dependencies: Vec::new(),
            ..Self::minimal()
        }
    }

    /// Set the engine module location.
    #[must_use]
    pub fn with_engine_module(mut self, path: impl AsRef<Path>) -> Self {
        self.engine_module = path.as_ref().to_path_buf();
        self
    }

    /// Append a mapping entry after the existing ones.
    #[must_use]
    pub fn with_mapping(mut self, entry: MappingEntry) -> Self {
        self.mappings.push(entry);
        self
    }

    /// Set the mixed-module policy.
    #[must_use]
    pub fn with_mixed_dependencies(mut self, action: MixedDependencyAction) -> Self {
        self.mixed_dependencies = action;
        self
    }

    /// Set the architecture preference.
    #[must_use]
    pub fn with_platform(mut self, platform: PlatformPreference) -> Self {
        self.platform = platform;
        self
    }

    /// Set the entry hook, `None` disables injection.
    #[must_use]
    pub fn with_entry_hook(mut self, hook: Option<HookMethod>) -> Self {
        self.entry_hook = hook;
        self
    }

    /// Add a name to the removal list.
    #[must_use]
    pub fn with_removed_dependency(mut self, name: impl Into<String>) -> Self {
        self.remove_dependencies.push(name.into());
        self
    }

    /// Add a module name whose public key token is destroyed.
    #[must_use]
    pub fn with_destroyed_token(mut self, name: impl Into<String>) -> Self {
        self.destroy_public_key_tokens.push(name.into());
        self
    }

    /// Enable or disable appending the engine reference.
    #[must_use]
    pub fn with_engine_reference(mut self, enabled: bool) -> Self {
        self.add_engine_reference = enabled;
        self
    }

    /// Enable or disable backup restore and engine file deployment together.
    #[must_use]
    pub fn with_file_side_effects(mut self, enabled: bool) -> Self {
        self.restore_backups = enabled;
        self.deploy_engine_files = enabled;
        self
    }

    /// The first mapping entry listing `name` as a source, ignoring activation.
    #[must_use]
    pub fn mapping_for_source(&self, name: &str) -> Option<&MappingEntry> {
        self.mappings.iter().find(|entry| entry.is_source(name))
    }

    /// Whether any mapping entry targets `name`.
    #[must_use]
    pub fn is_mapping_target(&self, name: &str) -> bool {
        self.mappings.iter().any(|entry| entry.target == name)
    }

    /// Whether any mapping entry lists `name` as a source.
    #[must_use]
    pub fn is_legacy_source(&self, name: &str) -> bool {
        self.mapping_for_source(name).is_some()
    }

    /// Every source name of the table, deduplicated, in table order.
    #[must_use]
    pub fn legacy_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for entry in &self.mappings {
            for source in &entry.sources {
                if source != &entry.target && !sources.contains(&source.as_str()) {
                    sources.push(source);
                }
            }
        }
        sources
    }

    /// Whether `path` has one of the configured module extensions.
    #[must_use]
    pub fn is_module_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.module_extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
    }
}

fn stock_mappings() -> Vec<MappingEntry> {
    vec![
        // Console titles reference System.Net as its own assembly
        MappingEntry::new("System", ["System.Net"]),
        MappingEntry::new(
            "FNA",
            [
                "Microsoft.Xna.Framework",
                "Microsoft.Xna.Framework.Avatar",
                "Microsoft.Xna.Framework.Content.Pipeline",
                "Microsoft.Xna.Framework.Game",
                "Microsoft.Xna.Framework.Graphics",
                "Microsoft.Xna.Framework.Input.Touch",
                "Microsoft.Xna.Framework.Storage",
                "Microsoft.Xna.Framework.Video",
                "Microsoft.Xna.Framework.Xact",
            ],
        ),
        MappingEntry::new(
            "MonoGame.Framework.Net",
            [
                "Microsoft.Xna.Framework.GamerServices",
                "Microsoft.Xna.Framework.Net",
                "Microsoft.Xna.Framework.Xdk",
            ],
        )
        .with_setup(SetupHook::NetworkingServices),
        MappingEntry::new(
            "FNA.Steamworks",
            [
                "FNA.Steamworks",
                "Microsoft.Xna.Framework.GamerServices",
                "Microsoft.Xna.Framework.Net",
                "Microsoft.Xna.Framework.Xdk",
            ],
        )
        .with_setup(SetupHook::NetworkingServices),
    ]
}
