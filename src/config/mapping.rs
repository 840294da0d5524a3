//! Mapping entries and their setup hooks.

use crate::{codec::Symbol, module::Module};

/// Namespaces the networking setup hook redirects out of the general multimedia modules.
pub const NETWORKING_NAMESPACES: &[&str] = &[
    "Microsoft.Xna.Framework.GamerServices",
    "Microsoft.Xna.Framework.Net",
];

/// A rule folding a set of legacy assembly names into one replacement assembly.
///
/// Entries only describe the rule. Whether an entry is active, and which catalog module
/// it resolved to, is tracked by [`crate::catalog::ModuleCatalog`].
///
/// # Examples
///
/// ```rust
/// use asmrelink::config::MappingEntry;
///
/// let entry = MappingEntry::new("ReplacementGfx", ["LegacyGfx", "LegacyGfx.Extras"]);
/// assert!(entry.is_source("LegacyGfx"));
/// assert!(!entry.is_source("ReplacementGfx"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Name of the replacement assembly
    pub target: String,
    /// Legacy assembly names remapped onto `target`
    pub sources: Vec<String>,
    /// Hook run once after the entry activates, before any relinking
    pub setup: Option<SetupHook>,
}

impl MappingEntry {
    /// Create an entry without a setup hook.
    pub fn new<I, S>(target: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            setup: None,
        }
    }

    /// Attach a setup hook.
    #[must_use]
    pub fn with_setup(mut self, hook: SetupHook) -> Self {
        self.setup = Some(hook);
        self
    }

    /// Whether a reference named `name` is a remap candidate for this entry.
    ///
    /// A name equal to the target is never a candidate, even when the source list
    /// contains it.
    #[must_use]
    pub fn is_source(&self, name: &str) -> bool {
        name != self.target && self.sources.iter().any(|source| source == name)
    }
}

/// A single type redirected by [`SetupHook::RedirectTypes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRedirect {
    /// Legacy assembly the type is currently resolved through
    pub module: String,
    /// Namespace-qualified type name
    pub full_name: String,
}

impl TypeRedirect {
    /// Create a type redirect.
    pub fn new(module: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            full_name: full_name.into(),
        }
    }
}

/// Extra remaps registered once a mapping entry activates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupHook {
    /// Redirect the gamer-services and networking types the target defines away from
    /// every legacy module, so they no longer resolve through the general multimedia
    /// replacement.
    NetworkingServices,
    /// Redirect an explicit list of types into the target.
    RedirectTypes(Vec<TypeRedirect>),
}

impl SetupHook {
    /// Compute the type remaps this hook contributes.
    ///
    /// `target` is the module the entry resolved to and `legacy_sources` every source
    /// name of the mapping table.
    #[must_use]
    pub fn remaps(&self, target: &Module, legacy_sources: &[&str]) -> Vec<(Symbol, Symbol)> {
        match self {
            SetupHook::NetworkingServices => target
                .types
                .iter()
                .filter(|full_name| is_networking_type(full_name))
                .flat_map(|full_name| {
                    legacy_sources.iter().map(move |source| {
                        (
                            Symbol::type_in(*source, full_name.as_str()),
                            Symbol::type_in(target.name(), full_name.as_str()),
                        )
                    })
                })
                .collect(),
            SetupHook::RedirectTypes(redirects) => redirects
                .iter()
                .map(|redirect| {
                    (
                        Symbol::type_in(&redirect.module, &redirect.full_name),
                        Symbol::type_in(target.name(), &redirect.full_name),
                    )
                })
                .collect(),
        }
    }
}

fn is_networking_type(full_name: &str) -> bool {
    let namespace = full_name.rsplit_once('.').map_or("", |(ns, _)| ns);
    NETWORKING_NAMESPACES.iter().any(|candidate| {
        namespace == *candidate
            || namespace
                .strip_prefix(candidate)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AssemblyVersion;

    #[test]
    fn test_target_is_never_a_source() {
        let entry = MappingEntry::new("FNA.Steamworks", ["FNA.Steamworks", "Legacy.Net"]);
        assert!(!entry.is_source("FNA.Steamworks"));
        assert!(entry.is_source("Legacy.Net"));
    }

    #[test]
    fn test_networking_hook_selects_networking_types() {
        let mut target = Module::new("Net.Replacement", AssemblyVersion::new(1, 0, 0, 0));
        target.types = vec![
            "Microsoft.Xna.Framework.GamerServices.Gamer".to_string(),
            "Microsoft.Xna.Framework.Net.NetworkSession".to_string(),
            "Microsoft.Xna.Framework.NetworkingHelpers".to_string(),
            "Microsoft.Xna.Framework.Game".to_string(),
        ];

        let remaps = SetupHook::NetworkingServices.remaps(&target, &["Legacy.A", "Legacy.B"]);
        assert_eq!(remaps.len(), 4);
        assert!(remaps.contains(&(
            Symbol::type_in("Legacy.B", "Microsoft.Xna.Framework.Net.NetworkSession"),
            Symbol::type_in("Net.Replacement", "Microsoft.Xna.Framework.Net.NetworkSession"),
        )));
        assert!(!remaps
            .iter()
            .any(|(old, _)| old.to_string().ends_with("Framework.Game")));
    }

    #[test]
    fn test_redirect_types_hook() {
        let target = Module::new("Target", AssemblyVersion::new(1, 0, 0, 0));
        let hook = SetupHook::RedirectTypes(vec![TypeRedirect::new("Legacy", "Ns.Widget")]);

        assert_eq!(
            hook.remaps(&target, &[]),
            vec![(
                Symbol::type_in("Legacy", "Ns.Widget"),
                Symbol::type_in("Target", "Ns.Widget")
            )]
        );
    }
}
