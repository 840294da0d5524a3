//! # asmrelink Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the asmrelink library. Import this module to get quick access to everything a
//! host needs to configure and drive a relink run.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all asmrelink operations
pub use crate::Error;

/// The result type used throughout asmrelink
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Orchestrates scanning, ordering, stubbing and relinking
pub use crate::Engine;

/// Outcome of a run
pub use crate::report::{ModuleAction, RunReport, SkipReason};

// ================================================================================================
// Configuration
// ================================================================================================

/// Run configuration and its policy enums
pub use crate::config::{
    HookMethod, MappingEntry, MixedDependencyAction, PlatformPreference, RelinkConfig, SetupHook,
    TypeRedirect,
};

// ================================================================================================
// Identity and Module Model
// ================================================================================================

/// Assembly identity types
pub use crate::identity::{AssemblyName, AssemblyVersion, HashAlgorithm, StrongName};

/// Structured module representation
pub use crate::module::{
    MethodHandle, Module, ModuleAttributes, ReferenceDescriptor, TargetArchitecture,
    TargetRuntime, Token, TypeReference,
};

// ================================================================================================
// Backends
// ================================================================================================

/// Codec and patcher boundaries
pub use crate::codec::{DependencyResolver, ModuleCodec, ReadMode, ReferencePatcher, Symbol};

/// In-memory backend
pub use crate::memory::MemoryStore;
