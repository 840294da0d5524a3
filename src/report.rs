//! Per-run outcome reporting.
//!
//! Every module the engine touches ends up with exactly one [`ModuleAction`] in the
//! [`RunReport`]. Outcomes are appended as they happen, so when a run aborts the report
//! still describes everything that was decided up to that point.

use std::{fmt, path::PathBuf};

/// Why a module was left out of the relink pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The file identified as a module but failed to load
    LoadFailed,
    /// Neither the module nor anything it depends on references a legacy assembly
    NoLegacyReferences,
    /// Another module with the same name was discovered first
    DuplicateName,
    /// The module is a mapping target; it is only ever referenced
    MappingTarget,
    /// The module is the engine's own module
    EngineModule,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::LoadFailed => "load failed",
            SkipReason::NoLegacyReferences => "no legacy references",
            SkipReason::DuplicateName => "duplicate name",
            SkipReason::MappingTarget => "mapping target",
            SkipReason::EngineModule => "engine module",
        };
        write!(f, "{}", reason)
    }
}

/// What happened to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleAction {
    /// References, body and attributes rewritten and written back
    Relinked,
    /// Replaced by an empty managed stub
    Stubbed,
    /// Dropped; references to it are stripped
    Removed,
    /// Left untouched by the mixed-module policy
    Kept,
    /// Not processed
    Skipped(SkipReason),
}

impl fmt::Display for ModuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleAction::Relinked => write!(f, "relinked"),
            ModuleAction::Stubbed => write!(f, "stubbed"),
            ModuleAction::Removed => write!(f, "removed"),
            ModuleAction::Kept => write!(f, "kept"),
            ModuleAction::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

/// One line of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
    /// Assembly name of the module
    pub name: String,
    /// File the module was read from
    pub path: PathBuf,
    /// What was done with it
    pub action: ModuleAction,
}

/// Outcome of a relink run.
///
/// # Usage
///
/// ```rust
/// use asmrelink::report::{ModuleAction, RunReport};
///
/// let report = RunReport::new();
/// assert!(report.is_empty());
/// assert_eq!(report.count(ModuleAction::Relinked), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    outcomes: Vec<ModuleOutcome>,
}

impl RunReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome and log it.
    pub(crate) fn record(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        action: ModuleAction,
    ) {
        let outcome = ModuleOutcome {
            name: name.into(),
            path: path.into(),
            action,
        };
        log::info!("[Report] {} - {}", outcome.name, outcome.action);
        self.outcomes.push(outcome);
    }

    /// All outcomes, in the order they were decided.
    #[must_use]
    pub fn outcomes(&self) -> &[ModuleOutcome] {
        &self.outcomes
    }

    /// The outcome recorded for module `name`, if any.
    #[must_use]
    pub fn action_of(&self, name: &str) -> Option<ModuleAction> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.name == name)
            .map(|outcome| outcome.action)
    }

    /// Number of outcomes equal to `action`.
    #[must_use]
    pub fn count(&self, action: ModuleAction) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action == action)
            .count()
    }

    /// Number of relinked modules.
    #[must_use]
    pub fn relinked_count(&self) -> usize {
        self.count(ModuleAction::Relinked)
    }

    /// Number of stubbed modules.
    #[must_use]
    pub fn stubbed_count(&self) -> usize {
        self.count(ModuleAction::Stubbed)
    }

    /// Number of removed modules.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.count(ModuleAction::Removed)
    }

    /// Number of skipped modules, whatever the reason.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.action, ModuleAction::Skipped(_)))
            .count()
    }

    /// Names of the relinked modules, in processing order.
    #[must_use]
    pub fn relinked(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action == ModuleAction::Relinked)
            .map(|outcome| outcome.name.as_str())
            .collect()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
