//! Assembly reference rewriting.

use crate::{
    identity::{COMPACT_FRAMEWORK_VERSION, FRAMEWORK_4_VERSION, FRAMEWORK_PUBLIC_KEY_TOKEN},
    module::Module,
    relink::RelinkContext,
    Result,
};

/// Rewrite the reference list of `module`, add the engine reference and raise the
/// runtime floor.
///
/// Every reference is matched against these rules, first match only:
///
/// 1. names a source of an active mapping: replaced by a reference to the mapping's
///    target, or removed when the module already references the target
/// 2. listed for removal: removed
/// 3. listed for token destruction: token zeroed
/// 4. names a stubbed module: Windows Runtime and public key flags cleared
/// 5. carries the compact framework version: rebound to the standard framework
///
/// Afterwards any repeated reference name is collapsed onto its first entry.
///
/// # Errors
/// Returns [`crate::Error::ModuleNotFound`] if an active mapping's target is no longer
/// open.
pub fn patch_references(module: &mut Module, ctx: &RelinkContext<'_>, tag: &str) -> Result<()> {
    let name = module.name().to_string();

    if ctx.catalog.destroys_token(&name) {
        log::info!("[{}] Destroying public key token for module {}", tag, name);
        module.assembly.clear_strong_name();
    }

    log::debug!("[{}] Updating dependencies", tag);
    let mut index = 0;
    while index < module.references.len() {
        let dependency = module.references[index].name.clone();

        if let Some((entry, target)) = ctx.catalog.active_mapping_for(ctx.config, &dependency) {
            if module.references_name(&entry.target) {
                log::info!(
                    "[{}] Removing dependency {}, already depends on {}",
                    tag,
                    dependency,
                    entry.target
                );
                module.references.remove(index);
                continue;
            }

            log::info!("[{}] Replacing dependency {} -> {}", tag, dependency, entry.target);
            module.references[index] = ctx.catalog.reference_to(target)?;
        } else if ctx.catalog.is_removed_dependency(&dependency) {
            log::info!("[{}] Removing unwanted dependency {}", tag, dependency);
            module.references.remove(index);
            continue;
        } else if ctx.catalog.destroys_token(&dependency) {
            log::info!("[{}] Destroying public key token for dependency {}", tag, dependency);
            module.references[index].public_key_token.clear();
        } else if ctx.catalog.is_stubbed(&dependency) {
            log::info!("[{}] Fixing stubbed dependency {}", tag, dependency);
            let reference = &mut module.references[index];
            reference.is_windows_runtime = false;
            reference.has_public_key = false;
        } else if module.references[index].version == COMPACT_FRAMEWORK_VERSION {
            log::info!("[{}] Rebinding compact framework dependency {}", tag, dependency);
            let reference = &mut module.references[index];
            reference.public_key_token = FRAMEWORK_PUBLIC_KEY_TOKEN.to_vec();
            reference.version = FRAMEWORK_4_VERSION;
        }

        index += 1;
    }

    remove_duplicates(module, tag);

    if ctx.config.add_engine_reference && !module.references_name(ctx.engine.name()) {
        log::info!("[{}] Adding dependency {}", tag, ctx.engine.name());
        module.references.push(ctx.engine.assembly.to_reference());
    }

    if module.runtime < ctx.config.runtime_floor {
        log::info!(
            "[{}] Raising runtime of {} from {} to {}",
            tag,
            name,
            module.runtime,
            ctx.config.runtime_floor
        );
        module.runtime = ctx.config.runtime_floor;
    }

    Ok(())
}

fn remove_duplicates(module: &mut Module, tag: &str) {
    let mut seen: Vec<String> = Vec::with_capacity(module.references.len());
    module.references.retain(|reference| {
        if seen.contains(&reference.name) {
            log::info!("[{}] Removing duplicate dependency {}", tag, reference.name);
            false
        } else {
            seen.push(reference.name.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RelinkConfig,
        identity::AssemblyVersion,
        module::{ReferenceDescriptor, TargetRuntime},
        test::factories::{catalog_fixture, engine_module, legacy_game},
    };

    fn names(module: &Module) -> Vec<&str> {
        module.reference_names().collect()
    }

    #[test]
    fn test_legacy_reference_is_replaced_by_target() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &["FNA"], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = legacy_game("Game");
        patch_references(&mut game, &ctx, "Relink").unwrap();

        assert_eq!(names(&game), vec!["mscorlib", "FNA"]);
        let fna = game.references.iter().find(|r| r.name == "FNA").unwrap();
        assert_eq!(fna.version, AssemblyVersion::new(23, 3, 0, 0));
    }

    #[test]
    fn test_existing_target_reference_wins() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &["FNA"], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = legacy_game("Game");
        game.references.push(ReferenceDescriptor::new(
            "FNA",
            AssemblyVersion::new(23, 3, 0, 0),
        ));
        patch_references(&mut game, &ctx, "Relink").unwrap();

        assert_eq!(names(&game), vec!["mscorlib", "FNA"]);
    }

    #[test]
    fn test_inactive_mapping_leaves_reference() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &[], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = legacy_game("Game");
        patch_references(&mut game, &ctx, "Relink").unwrap();
        assert!(game.references_name("Microsoft.Xna.Framework"));
    }

    #[test]
    fn test_removal_and_token_rules() {
        let config = RelinkConfig::minimal().with_destroyed_token("Signed");
        let catalog = catalog_fixture(&config, &[], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        game.references = vec![
            ReferenceDescriptor::new("Microsoft.VisualC", AssemblyVersion::new(8, 0, 0, 0)),
            ReferenceDescriptor::new("Signed", AssemblyVersion::new(1, 0, 0, 0))
                .with_token(&[1, 2, 3, 4, 5, 6, 7, 8]),
            ReferenceDescriptor::new("", AssemblyVersion::UNKNOWN),
        ];
        patch_references(&mut game, &ctx, "Relink").unwrap();

        assert_eq!(names(&game), vec!["Signed"]);
        assert!(game.references[0].public_key_token.is_empty());
    }

    #[test]
    fn test_stubbed_dependency_flags_cleared() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &[], &["Native"]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut reference = ReferenceDescriptor::new("Native", AssemblyVersion::new(1, 0, 0, 0));
        reference.has_public_key = true;
        reference.is_windows_runtime = true;
        let mut game = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        game.references.push(reference);

        patch_references(&mut game, &ctx, "Relink").unwrap();
        assert!(!game.references[0].has_public_key);
        assert!(!game.references[0].is_windows_runtime);
    }

    #[test]
    fn test_compact_framework_rebound() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &[], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        game.references.push(
            ReferenceDescriptor::new("System.Xml", COMPACT_FRAMEWORK_VERSION)
                .with_token(&[0x1c, 0x9e, 0x25, 0x96, 0x86, 0xf9, 0x21, 0xe0]),
        );
        patch_references(&mut game, &ctx, "Relink").unwrap();

        assert_eq!(game.references[0].version, FRAMEWORK_4_VERSION);
        assert_eq!(
            game.references[0].public_key_token,
            FRAMEWORK_PUBLIC_KEY_TOKEN.to_vec()
        );
    }

    #[test]
    fn test_engine_reference_and_runtime_floor() {
        let config = RelinkConfig::stock();
        let catalog = catalog_fixture(&config, &[], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        game.runtime = TargetRuntime::Net2_0;
        patch_references(&mut game, &ctx, "Relink").unwrap();
        patch_references(&mut game, &ctx, "Relink").unwrap();

        assert_eq!(names(&game), vec![engine.name()]);
        assert_eq!(game.runtime, TargetRuntime::Net4_0);
    }

    #[test]
    fn test_repeated_names_collapse() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &["FNA"], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = Module::new("Game", AssemblyVersion::new(1, 0, 0, 0));
        for name in [
            "Microsoft.Xna.Framework",
            "Microsoft.Xna.Framework.Graphics",
            "Lib",
            "Lib",
        ] {
            game.references
                .push(ReferenceDescriptor::new(name, AssemblyVersion::new(4, 0, 0, 0)));
        }
        patch_references(&mut game, &ctx, "Relink").unwrap();

        assert_eq!(names(&game), vec!["FNA", "Lib"]);
    }
}
