//! Boundaries to the external binary codec and reference patcher.
//!
//! The relink engine never encodes or decodes PE images and never edits IL itself. It
//! consumes two collaborators:
//!
//! - a [`ModuleCodec`], which probes, reads, writes and releases modules, and
//! - a [`ReferencePatcher`], which rewrites every usage of a symbol throughout a module
//!   body and injects calls at the entry point.
//!
//! While the patcher rewrites a body it may need modules the body points at. It asks the
//! engine through a [`DependencyResolver`]; a `None` answer is logged by the resolver and
//! does not abort the run.
//!
//! [`crate::memory::MemoryStore`] implements both traits over in-memory modules.

use std::{fmt, path::Path};

use crate::{module::Module, Result};

/// How a module is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMode {
    /// Opened for lookups only; the module is never written back
    ReadOnly,
    /// Opened with a mutation lease; the module is written back after relinking
    ReadWrite,
}

impl ReadMode {
    /// Whether this mode allows writing the module back.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self, ReadMode::ReadWrite)
    }
}

/// A symbol a module body can resolve through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// Every type the body resolves through the named assembly
    Module(String),
    /// A single type, by full name, as resolved through the named assembly
    Type {
        /// Assembly the type resolves through
        module: String,
        /// Namespace-qualified type name
        full_name: String,
    },
}

impl Symbol {
    /// Shorthand for [`Symbol::Type`].
    pub fn type_in(module: impl Into<String>, full_name: impl Into<String>) -> Self {
        Symbol::Type {
            module: module.into(),
            full_name: full_name.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Module(name) => write!(f, "[{}]", name),
            Symbol::Type { module, full_name } => write!(f, "[{}]{}", module, full_name),
        }
    }
}

/// A method living outside the module being patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalMethod {
    /// Assembly defining the method
    pub module: String,
    /// Full name of the declaring type
    pub declaring_type: String,
    /// Method name
    pub name: String,
}

impl fmt::Display for ExternalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}::{}", self.module, self.declaring_type, self.name)
    }
}

/// Reads and writes binary modules.
///
/// Implementations own everything about the on-disk encoding. The engine guarantees that
/// a module opened with [`ReadMode::ReadWrite`] is written at most once and released
/// exactly once, and that no two stages hold it at the same time.
pub trait ModuleCodec {
    /// Cheaply determine the assembly name of the module at `path` without a full load.
    ///
    /// # Errors
    /// Returns an error if the file is not a managed module.
    fn identify(&self, path: &Path) -> Result<String>;

    /// Load the module at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded.
    fn read_module(&self, path: &Path, mode: ReadMode) -> Result<Module>;

    /// Serialize `module` to `destination`.
    ///
    /// # Errors
    /// Returns an error if the module cannot be encoded or stored.
    fn write_module(&self, module: &Module, destination: &Path) -> Result<()>;

    /// Close the handle backing `module`.
    fn release(&self, module: Module);
}

/// Answers lookups for modules a body references but the patcher has not loaded.
pub trait DependencyResolver {
    /// Find the module `name` (display name `full_name`) that `requester` depends on.
    fn resolve_missing(&mut self, requester: &str, name: &str, full_name: &str)
        -> Option<&Module>;
}

/// Rewrites symbol usages inside module bodies.
pub trait ReferencePatcher {
    /// Queue a rewrite of every usage of `old` to `new`.
    fn register_symbol_remap(&mut self, old: Symbol, new: Symbol);

    /// Apply every queued remap to `module`, resolving dependencies through `resolver`.
    ///
    /// # Errors
    /// Returns an error if the body cannot be rewritten.
    fn apply_pending_remaps(
        &mut self,
        module: &mut Module,
        resolver: &mut dyn DependencyResolver,
    ) -> Result<()>;

    /// Insert `ldarg.0; call hook` before the first instruction of the entry point.
    ///
    /// # Errors
    /// Returns an error if the module has no entry point or the body cannot be edited.
    fn inject_call_at_entry(&mut self, module: &mut Module, hook: &ExternalMethod) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_display() {
        assert_eq!(Symbol::Module("FNA".into()).to_string(), "[FNA]");
        assert_eq!(
            Symbol::type_in("FNA", "Microsoft.Xna.Framework.Game").to_string(),
            "[FNA]Microsoft.Xna.Framework.Game"
        );
    }

    #[test]
    fn test_read_mode() {
        assert!(ReadMode::ReadWrite.is_writable());
        assert!(!ReadMode::ReadOnly.is_writable());
    }
}
