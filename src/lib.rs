// Copyright 2025 asmrelink contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # asmrelink
//!
//! Relinks compiled .NET game assemblies that were built against a legacy, proprietary
//! multimedia runtime so they resolve against a compatible open reimplementation instead.
//! No source code is needed: the crate rewrites assembly references, symbol usages and a
//! handful of module attributes in place.
//!
//! ## What the crate does
//!
//! - **Discovery** - [`catalog::ModuleCatalog`] walks the given paths, probes every
//!   candidate file and classifies it as a mapping target, an ordinary module, an
//!   incompatible (mixed-mode) module or an irrelevant file.
//! - **Mapping** - [`config::MappingEntry`] rules describe which legacy assembly names
//!   are folded into which replacement assembly.
//! - **Ordering** - [`order::DependencyOrderer`] produces a processing order where every
//!   module comes after the catalog modules it references.
//! - **Stubbing** - [`stub::StubGenerator`] replaces mixed-mode modules with empty,
//!   managed-only equivalents when the policy asks for it.
//! - **Relinking** - [`relink::ReferenceRelinker`] runs the per-module pipeline and
//!   writes each module back before the next one is opened.
//!
//! ## What the crate does not do
//!
//! Parsing and serializing PE images is the job of a [`codec::ModuleCodec`], and
//! rewriting symbol usages inside method bodies is the job of a
//! [`codec::ReferencePatcher`]. Both are traits; [`memory::MemoryStore`] implements
//! them over in-memory modules for dry runs and tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asmrelink::prelude::*;
//!
//! let store = MemoryStore::new();
//! let config = RelinkConfig::default().with_engine_module("/opt/relink/Relink.exe");
//!
//! let mut engine = Engine::new(config, store.clone(), store)?;
//! engine.scan_paths(&["/games/MyGame"])?;
//! let report = engine.relink_all()?;
//! println!("relinked {} modules", report.relinked_count());
//! engine.finish();
//! # Ok::<(), asmrelink::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade. Every message carries a bracketed stage
//! tag (`[ScanPath]`, `[OrderModules]`, `[Relink]`, `[Stub]`, ...). Installing a logger
//! is left to the host.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use asmrelink::prelude::*;
///
/// let config = RelinkConfig::default();
/// assert_eq!(config.mixed_dependencies, MixedDependencyAction::Stub);
/// ```
pub mod prelude;

/// Assembly identities: names, versions and strong-name tokens.
pub mod identity;

/// The structured module representation handed out by a codec.
pub mod module;

/// The boundaries to the external binary codec and reference patcher.
pub mod codec;

/// Relink configuration: mapping table, removal lists and policies.
pub mod config;

/// Module discovery, classification and lifecycle tracking.
pub mod catalog;

/// Dependency ordering of catalog modules.
pub mod order;

/// Replacement of mixed-mode modules with empty managed stubs.
pub mod stub;

/// The per-module relink pipeline.
pub mod relink;

/// Per-run outcome reporting.
pub mod report;

/// Top-level orchestration of a relink run.
pub mod engine;

/// In-memory codec and patcher backend.
pub mod memory;

/// `asmrelink` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `asmrelink` Error type
///
/// The main error type for all operations in this crate. Whether an error aborts a run
/// depends on where it is raised; see [`Error`] for the taxonomy.
pub use error::Error;

/// Main entry point for a relink run.
///
/// See [`engine::Engine`] for the full lifecycle.
pub use engine::Engine;

/// Configuration consumed by every stage of a run.
pub use config::RelinkConfig;
