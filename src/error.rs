use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::{ModuleState, Stage};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// Errors fall into three groups, and the engine treats them differently:
///
/// ## Recovered locally
/// - [`Error::Codec`] raised while identifying or loading a scan candidate - the file is
///   skipped and a diagnostic is logged
/// - [`Error::Malformed`] - a textual identity (version, architecture) could not be parsed
///
/// ## Run-aborting
/// - [`Error::AlreadyLeased`] / [`Error::NotLeased`] - a module lease invariant was violated
/// - [`Error::InvalidTransition`] - a module was driven through an illegal lifecycle step
/// - [`Error::WriteFailed`] - a rewritten module could not be stored
/// - [`Error::EngineModule`] - the engine's own module could not be loaded at startup
/// - [`Error::Patch`] - the reference patcher rejected a module
///
/// ## Plumbing
/// - [`Error::FileError`] - filesystem I/O while restoring backups or deploying files
/// - [`Error::LockError`] - a shared backend lock was poisoned
///
/// # Examples
///
/// ```rust
/// use asmrelink::Error;
///
/// fn describe(err: &Error) -> &'static str {
///     match err {
///         Error::AlreadyLeased { .. } | Error::WriteFailed { .. } => "fatal",
///         Error::Codec(_) => "skipped",
///         _ => "other",
///     }
/// }
///
/// assert_eq!(describe(&Error::Codec("not a module".into())), "skipped");
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A textual identity could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// The module codec could not identify, read or decode a file.
    #[error("Codec error - {0}")]
    Codec(String),

    /// The reference patcher failed while rewriting a module body.
    #[error("Patch error in {module} - {message}")]
    Patch {
        /// Name of the module being patched
        module: String,
        /// What went wrong
        message: String,
    },

    /// A stage tried to lease a module that another stage already holds.
    #[error("Module {module} is already leased by {holder}")]
    AlreadyLeased {
        /// Name of the module
        module: String,
        /// The stage currently holding the lease
        holder: Stage,
    },

    /// A stage tried to mutate or release a module it never leased.
    #[error("Module {0} is not leased")]
    NotLeased(String),

    /// A module was driven through a lifecycle step that is not allowed.
    #[error("Module {module} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Name of the module
        module: String,
        /// State the module was in
        from: ModuleState,
        /// State that was requested
        to: ModuleState,
    },

    /// A rewritten module could not be written back to storage.
    #[error("Failed to write {module} to {}: {message}", path.display())]
    WriteFailed {
        /// Name of the module
        module: String,
        /// Destination that was being written
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// The engine's own module could not be loaded.
    ///
    /// Relinked modules gain a reference to the engine, so a run cannot start without it.
    #[error("Failed to load the engine module from {}: {message}", path.display())]
    EngineModule {
        /// Where the engine module was expected
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// A module name was looked up that the catalog does not know.
    #[error("Module not found in catalog - {0}")]
    ModuleNotFound(String),

    /// A strong-name token was requested with a hash algorithm that has no implementation.
    #[error("Unsupported hash algorithm - 0x{0:04X}")]
    UnsupportedHashAlgorithm(u32),

    /// Failed to lock target.
    ///
    /// This error occurs when a shared lock of a backend is poisoned.
    #[error("Failed to lock target")]
    LockError,
}
