//! Assembly identities for relinking.
//!
//! Every decision the relinker makes is keyed on assembly identity: which references
//! name a legacy assembly, which catalog module a reference points at, and what the
//! rewritten reference must look like so the runtime binds it to the replacement.
//!
//! # Module Structure
//!
//! - [`version`] - Four-part [`AssemblyVersion`] with parsing, ordering and well-known values
//! - [`strongname`] - [`StrongName`] keys and tokens, plus [`HashAlgorithm`] token derivation
//! - [`name`] - [`AssemblyName`], the identity of a module as its own manifest declares it
//!
//! # Well-known identities
//!
//! Titles built for the console flavour of the runtime reference the compact framework
//! (version [`COMPACT_FRAMEWORK_VERSION`]). The desktop replacement expects the standard
//! framework identity instead, so such references are rewritten to
//! [`FRAMEWORK_PUBLIC_KEY_TOKEN`] and [`FRAMEWORK_4_VERSION`].
//!
//! ```rust
//! use asmrelink::identity::{AssemblyVersion, COMPACT_FRAMEWORK_VERSION};
//!
//! let version: AssemblyVersion = "2.0.5.0".parse()?;
//! assert_eq!(version, COMPACT_FRAMEWORK_VERSION);
//! # Ok::<(), asmrelink::Error>(())
//! ```

pub mod name;
pub mod strongname;
pub mod version;

pub use name::AssemblyName;
pub use strongname::{format_token, HashAlgorithm, StrongName};
pub use version::AssemblyVersion;

/// Public key token of the standard framework assemblies (`b77a5c561934e089`).
pub const FRAMEWORK_PUBLIC_KEY_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

/// Version of the standard desktop framework the replacement runtime targets.
pub const FRAMEWORK_4_VERSION: AssemblyVersion = AssemblyVersion::new(4, 0, 0, 0);

/// Version of the standard desktop framework 2.0 line.
pub const FRAMEWORK_2_VERSION: AssemblyVersion = AssemblyVersion::new(2, 0, 0, 0);

/// Version carried by references to the console compact framework.
pub const COMPACT_FRAMEWORK_VERSION: AssemblyVersion = AssemblyVersion::new(2, 0, 5, 0);
