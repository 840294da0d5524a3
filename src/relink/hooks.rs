//! Symbol remaps computed from the active mappings and their setup hooks.

use std::collections::HashMap;

use crate::{catalog::ModuleCatalog, codec::Symbol, config::RelinkConfig};

/// The complete set of body remaps for a run.
///
/// Each old symbol maps to exactly one new symbol. The first registration wins, matching
/// the first-match rule reference rewriting uses; a conflicting later registration is
/// logged and dropped.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    remaps: Vec<(Symbol, Symbol)>,
    index: HashMap<Symbol, usize>,
}

impl RemapTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `old -> new`. Returns `false` if `old` was already mapped.
    pub fn register(&mut self, old: Symbol, new: Symbol) -> bool {
        if let Some(&existing) = self.index.get(&old) {
            let (_, current) = &self.remaps[existing];
            if *current != new {
                log::warn!(
                    "[Relink] Ignoring remap {} -> {}, already mapped to {}",
                    old,
                    new,
                    current
                );
            }
            return false;
        }

        self.index.insert(old.clone(), self.remaps.len());
        self.remaps.push((old, new));
        true
    }

    /// The symbol `old` is remapped to.
    #[must_use]
    pub fn get(&self, old: &Symbol) -> Option<&Symbol> {
        self.index.get(old).map(|&i| &self.remaps[i].1)
    }

    /// All remaps in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, Symbol)> {
        self.remaps.iter()
    }

    /// Number of remaps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.remaps.len()
    }

    /// Whether no remap is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaps.is_empty()
    }
}

/// Register a module-level remap for every source name of every active mapping.
///
/// Sources are visited in table order and each resolves through
/// [`ModuleCatalog::active_mapping_for`], so body remaps agree with reference rewriting.
pub fn register_module_remaps(config: &RelinkConfig, catalog: &ModuleCatalog, table: &mut RemapTable) {
    for source in config.legacy_sources() {
        if let Some((entry, _)) = catalog.active_mapping_for(config, source) {
            table.register(
                Symbol::Module(source.to_string()),
                Symbol::Module(entry.target.clone()),
            );
        }
    }
}

/// Run the setup hook of every active mapping, once, in table order.
///
/// Returns the number of hooks run.
pub fn run_setup_hooks(config: &RelinkConfig, catalog: &ModuleCatalog, table: &mut RemapTable) -> usize {
    let sources = config.legacy_sources();
    let mut ran = 0;

    for (index, entry) in config.mappings.iter().enumerate() {
        let Some(hook) = &entry.setup else {
            continue;
        };
        let Some(target) = catalog
            .resolved_target(index)
            .and_then(|id| catalog.entry(id))
            .and_then(|target| target.module())
        else {
            continue;
        };

        log::info!("[Relink] Running setup hook of mapping {}", entry.target);
        for (old, new) in hook.remaps(target, &sources) {
            table.register(old, new);
        }
        ran += 1;
    }

    ran
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::catalog_fixture;

    #[test]
    fn test_first_registration_wins() {
        let mut table = RemapTable::new();
        assert!(table.register(Symbol::Module("A".into()), Symbol::Module("B".into())));
        assert!(!table.register(Symbol::Module("A".into()), Symbol::Module("C".into())));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(&Symbol::Module("A".into())),
            Some(&Symbol::Module("B".into()))
        );
    }

    #[test]
    fn test_module_remaps_follow_active_mappings() {
        let config = RelinkConfig::stock();
        let catalog = catalog_fixture(&config, &["FNA"], &[]);
        let mut table = RemapTable::new();
        register_module_remaps(&config, &catalog, &mut table);

        assert_eq!(table.len(), 9);
        assert_eq!(
            table.get(&Symbol::Module("Microsoft.Xna.Framework.Graphics".into())),
            Some(&Symbol::Module("FNA".into()))
        );
        assert!(table
            .get(&Symbol::Module("Microsoft.Xna.Framework.Net".into()))
            .is_none());
    }

    #[test]
    fn test_setup_hooks_run_for_active_mappings_only() {
        let config = RelinkConfig::stock();
        let catalog = catalog_fixture(&config, &["FNA", "MonoGame.Framework.Net"], &[]);
        let mut table = RemapTable::new();

        assert_eq!(run_setup_hooks(&config, &catalog, &mut table), 1);
        assert_eq!(
            table.get(&Symbol::type_in(
                "Microsoft.Xna.Framework",
                "Microsoft.Xna.Framework.GamerServices.Gamer"
            )),
            Some(&Symbol::type_in(
                "MonoGame.Framework.Net",
                "Microsoft.Xna.Framework.GamerServices.Gamer"
            ))
        );
    }
}
