//! The structured module representation.
//!
//! A [`Module`] is what a [`crate::codec::ModuleCodec`] hands back after reading a binary:
//! the manifest identity, the assembly reference list, the defined types, the type
//! references the body resolves through, the entry point and the CLI header flags.
//! The relinker only ever mutates this representation; turning it back into bytes is
//! the codec's job.
//!
//! # Key Types
//!
//! - [`Module`] - One compiled binary unit
//! - [`ReferenceDescriptor`] - An entry of the assembly reference list
//! - [`ModuleAttributes`] - CLI header flags (`IL_ONLY`, `STRONG_NAME_SIGNED`, ...)
//! - [`TargetArchitecture`] / [`TargetRuntime`] - Platform and runtime the module targets
//! - [`TypeReference`] - A type the body uses, scoped to the module that defines it
//! - [`MethodHandle`] - A method, used for the entry point

use bitflags::bitflags;

use crate::identity::{AssemblyName, AssemblyVersion};

mod reference;
mod target;
mod token;

pub use reference::ReferenceDescriptor;
pub use target::{TargetArchitecture, TargetRuntime};
pub use token::Token;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// CLI header flags of a module, §II.25.3.3.1
    pub struct ModuleAttributes : u32 {
        /// The image contains only managed code
        const IL_ONLY = 0x0000_0001;
        /// The image must be loaded into a 32-bit process
        const REQUIRED_32BIT = 0x0000_0002;
        /// The image carries a strong-name signature
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// The image prefers a 32-bit process but can run 64-bit
        const PREFERRED_32BIT = 0x0002_0000;
    }
}

impl Default for ModuleAttributes {
    fn default() -> Self {
        ModuleAttributes::IL_ONLY
    }
}

/// A type used by a module body, scoped to the assembly expected to define it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    /// Name of the assembly the type resolves through
    pub scope: String,
    /// Namespace-qualified type name
    pub full_name: String,
}

impl TypeReference {
    /// Create a type reference.
    pub fn new(scope: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            full_name: full_name.into(),
        }
    }
}

/// A method defined by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    /// `MethodDef` token
    pub token: Token,
    /// Full name of the declaring type
    pub declaring_type: String,
    /// Method name
    pub name: String,
}

impl MethodHandle {
    /// Create a method handle.
    pub fn new(token: Token, declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token,
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }
}

/// A compiled binary unit with a versioned identity and a reference list.
///
/// # Examples
///
/// ```rust
/// use asmrelink::identity::AssemblyVersion;
/// use asmrelink::module::{Module, ReferenceDescriptor};
///
/// let mut game = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
/// game.references.push(ReferenceDescriptor::new(
///     "Microsoft.Xna.Framework",
///     AssemblyVersion::new(4, 0, 0, 0),
/// ));
///
/// assert!(game.references_name("Microsoft.Xna.Framework"));
/// assert!(game.is_pure_managed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// The identity the module declares for itself
    pub assembly: AssemblyName,
    /// Assembly reference list, in metadata order
    pub references: Vec<ReferenceDescriptor>,
    /// Full names of the types the module defines
    pub types: Vec<String>,
    /// Types the module body uses from other assemblies
    pub type_references: Vec<TypeReference>,
    /// Entry point, for executables
    pub entry_point: Option<MethodHandle>,
    /// Runtime version the module declares
    pub runtime: TargetRuntime,
    /// CLI header flags
    pub attributes: ModuleAttributes,
    /// Machine type of the PE header
    pub architecture: TargetArchitecture,
    /// Full names of the custom attributes applied to the assembly
    pub assembly_attributes: Vec<String>,
    /// Full names of the custom attributes applied to the module
    pub module_attributes: Vec<String>,
}

impl Module {
    /// Create an empty managed module.
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        Self {
            assembly: AssemblyName::new(name, version),
            references: Vec::new(),
            types: Vec::new(),
            type_references: Vec::new(),
            entry_point: None,
            runtime: TargetRuntime::default(),
            attributes: ModuleAttributes::default(),
            architecture: TargetArchitecture::default(),
            assembly_attributes: Vec::new(),
            module_attributes: Vec::new(),
        }
    }

    /// Simple name of the module's assembly.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.assembly.name
    }

    /// Version of the module's assembly.
    #[must_use]
    pub fn version(&self) -> AssemblyVersion {
        self.assembly.version
    }

    /// Public key token of the module's assembly, empty when unsigned.
    #[must_use]
    pub fn public_key_token(&self) -> Vec<u8> {
        self.assembly.public_key_token()
    }

    /// Whether the image contains managed code only.
    ///
    /// Mixed-mode images carry native sections the patcher cannot rewrite.
    #[must_use]
    pub fn is_pure_managed(&self) -> bool {
        self.attributes.contains(ModuleAttributes::IL_ONLY)
    }

    /// Whether the image carries a strong-name signature.
    #[must_use]
    pub fn is_strong_name_signed(&self) -> bool {
        self.attributes.contains(ModuleAttributes::STRONG_NAME_SIGNED)
    }

    /// Whether any assembly reference names `name`.
    #[must_use]
    pub fn references_name(&self, name: &str) -> bool {
        self.references.iter().any(|reference| reference.name == name)
    }

    /// Iterate the names of all assembly references.
    pub fn reference_names(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|reference| reference.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_module_is_managed_and_unsigned() {
        let module = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        assert!(module.is_pure_managed());
        assert!(!module.is_strong_name_signed());
        assert!(module.public_key_token().is_empty());
        assert_eq!(module.runtime, TargetRuntime::Net4_0);
    }

    #[test]
    fn test_mixed_mode_detection() {
        let mut module = Module::new("Native", AssemblyVersion::new(1, 0, 0, 0));
        module.attributes.remove(ModuleAttributes::IL_ONLY);
        assert!(!module.is_pure_managed());
    }

    #[test]
    fn test_reference_lookup() {
        let mut module = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        module.references.push(ReferenceDescriptor::new(
            "FNA",
            AssemblyVersion::new(23, 3, 0, 0),
        ));

        assert!(module.references_name("FNA"));
        assert!(!module.references_name("fna"));
        assert_eq!(module.reference_names().collect::<Vec<_>>(), vec!["FNA"]);
    }
}
