//! Module lifecycle states and mutation leases.

use std::fmt;

use strum::{Display, EnumIter};

/// Where a module is in its single pass through the engine.
///
/// ```text
/// Discovered -> Classified -> Leased -> Relinked -> Released
///                                    -> Stubbed  -> Released
///                                    -> Released            (aborted)
/// Discovered | Classified -> Skipped -> Released
/// Classified -> Released                                    (reference-only modules)
/// ```
///
/// No state is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ModuleState {
    /// Loaded by the codec, not yet classified
    Discovered,
    /// Classified and waiting for its stage
    Classified,
    /// Held by a stage with a mutation lease
    Leased,
    /// Rewritten by the relink pipeline
    Relinked,
    /// Replaced by an empty stub
    Stubbed,
    /// Excluded from processing
    Skipped,
    /// Handle closed; the module may only be re-opened read-only for lookups
    Released,
}

impl ModuleState {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::{Classified, Discovered, Leased, Relinked, Released, Skipped, Stubbed};

        matches!(
            (self, next),
            (Discovered, Classified | Skipped)
                | (Classified, Leased | Skipped | Released)
                | (Leased, Relinked | Stubbed | Released)
                | (Relinked | Stubbed | Skipped, Released)
        )
    }

    /// Whether the module has finished its pass.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ModuleState::Released)
    }
}

/// The stage holding a mutation lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Stage {
    /// The stub generator
    Stub,
    /// The relink pipeline
    Relink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Matches the log tags of each stage
        match self {
            Stage::Stub => write!(f, "[Stub]"),
            Stage::Relink => write!(f, "[Relink]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_happy_paths() {
        use ModuleState::*;

        for path in [
            &[Discovered, Classified, Leased, Relinked, Released][..],
            &[Discovered, Classified, Leased, Stubbed, Released],
            &[Discovered, Classified, Skipped, Released],
            &[Discovered, Skipped, Released],
            &[Discovered, Classified, Released],
            &[Discovered, Classified, Leased, Released],
        ] {
            for pair in path.windows(2) {
                assert!(
                    pair[0].can_transition_to(pair[1]),
                    "{} -> {} should be legal",
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn test_no_state_is_revisited() {
        for state in ModuleState::iter() {
            assert!(!state.can_transition_to(state));
            assert!(!ModuleState::Released.can_transition_to(state));
        }
        assert!(!ModuleState::Relinked.can_transition_to(ModuleState::Leased));
        assert!(!ModuleState::Stubbed.can_transition_to(ModuleState::Relinked));
        assert!(!ModuleState::Discovered.can_transition_to(ModuleState::Leased));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Relink.to_string(), "[Relink]");
        assert_eq!(Stage::iter().count(), 2);
    }
}
