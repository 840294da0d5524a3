//! Module attribute fixes applied to every rewritten module.

use crate::{
    config::PlatformPreference,
    module::{Module, ModuleAttributes, TargetArchitecture},
    relink::RelinkContext,
};

/// Module attribute marking code the runtime must not verify.
pub const UNVERIFIABLE_CODE_ATTRIBUTE: &str = "System.Security.UnverifiableCodeAttribute";

/// Assembly attribute claiming CLS compliance.
pub const CLS_COMPLIANT_ATTRIBUTE: &str = "System.CLSCompliantAttribute";

/// Strip the strong-name flag, apply the platform preference and mark the module unsafe
/// when needed.
///
/// A module is marked unsafe when the run stubs any module, when `is_stub` is set, or
/// when the module still carries native content. Marking forces `IL_ONLY`, adds the
/// unverifiable-code attribute once and drops the CLS-compliance attribute.
pub fn patch_attributes(module: &mut Module, ctx: &RelinkContext<'_>, tag: &str, is_stub: bool) {
    log::debug!("[{}] Updating module attributes", tag);
    module.attributes.remove(ModuleAttributes::STRONG_NAME_SIGNED);

    apply_platform(module, ctx.config.platform);

    let mixed = !module.is_pure_managed();
    if ctx.catalog.has_stubs() || is_stub || mixed {
        log::info!("[{}] Making assembly {} unsafe", tag, module.name());
        module.attributes.insert(ModuleAttributes::IL_ONLY);
        module
            .assembly_attributes
            .retain(|attribute| attribute != CLS_COMPLIANT_ATTRIBUTE);
        if !module
            .module_attributes
            .iter()
            .any(|attribute| attribute == UNVERIFIABLE_CODE_ATTRIBUTE)
        {
            module
                .module_attributes
                .push(UNVERIFIABLE_CODE_ATTRIBUTE.to_string());
        }
    }
}

/// Rewrite architecture and 32-bit flags for `platform`.
pub fn apply_platform(module: &mut Module, platform: PlatformPreference) {
    if platform == PlatformPreference::Keep {
        return;
    }

    // Start from a platform-neutral image
    module.architecture = TargetArchitecture::I386;
    module
        .attributes
        .remove(ModuleAttributes::REQUIRED_32BIT | ModuleAttributes::PREFERRED_32BIT);

    match platform {
        PlatformPreference::X86 => module.attributes.insert(ModuleAttributes::REQUIRED_32BIT),
        PlatformPreference::X64 => module.architecture = TargetArchitecture::AMD64,
        PlatformPreference::X86Preferred => {
            module.attributes.insert(ModuleAttributes::PREFERRED_32BIT);
        }
        PlatformPreference::AnyCpu | PlatformPreference::Keep => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RelinkConfig,
        test::factories::{catalog_fixture, engine_module, legacy_game},
    };

    #[test]
    fn test_strong_name_flag_always_stripped() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &[], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = legacy_game("Game");
        game.attributes.insert(ModuleAttributes::STRONG_NAME_SIGNED);
        game.assembly_attributes.push(CLS_COMPLIANT_ATTRIBUTE.to_string());
        patch_attributes(&mut game, &ctx, "Relink", false);

        assert!(!game.is_strong_name_signed());
        // Nothing is stubbed and the module is managed, so it is not marked unsafe
        assert!(game.module_attributes.is_empty());
        assert_eq!(game.assembly_attributes, vec![CLS_COMPLIANT_ATTRIBUTE]);
    }

    #[test]
    fn test_platform_preferences() {
        let mut game = legacy_game("Game");
        game.architecture = TargetArchitecture::AMD64;
        game.attributes.insert(ModuleAttributes::PREFERRED_32BIT);

        apply_platform(&mut game, PlatformPreference::Keep);
        assert_eq!(game.architecture, TargetArchitecture::AMD64);

        apply_platform(&mut game, PlatformPreference::X86);
        assert_eq!(game.architecture, TargetArchitecture::I386);
        assert!(game.attributes.contains(ModuleAttributes::REQUIRED_32BIT));
        assert!(!game.attributes.contains(ModuleAttributes::PREFERRED_32BIT));

        apply_platform(&mut game, PlatformPreference::X64);
        assert_eq!(game.architecture, TargetArchitecture::AMD64);
        assert!(!game.attributes.contains(ModuleAttributes::REQUIRED_32BIT));

        apply_platform(&mut game, PlatformPreference::X86Preferred);
        assert_eq!(game.architecture, TargetArchitecture::I386);
        assert!(game.attributes.contains(ModuleAttributes::PREFERRED_32BIT));

        apply_platform(&mut game, PlatformPreference::AnyCpu);
        assert_eq!(game.architecture, TargetArchitecture::I386);
        assert!(!game.attributes.intersects(
            ModuleAttributes::REQUIRED_32BIT | ModuleAttributes::PREFERRED_32BIT
        ));
    }

    #[test]
    fn test_unsafe_marking_is_idempotent() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &[], &["Native"]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut game = legacy_game("Game");
        game.assembly_attributes.push(CLS_COMPLIANT_ATTRIBUTE.to_string());
        patch_attributes(&mut game, &ctx, "Relink", false);
        patch_attributes(&mut game, &ctx, "Relink", false);

        assert_eq!(game.module_attributes, vec![UNVERIFIABLE_CODE_ATTRIBUTE]);
        assert!(game.assembly_attributes.is_empty());
        assert!(game.is_pure_managed());
    }

    #[test]
    fn test_mixed_module_forced_managed() {
        let config = RelinkConfig::minimal();
        let catalog = catalog_fixture(&config, &[], &[]);
        let engine = engine_module();
        let ctx = RelinkContext::new(&config, &catalog, &engine);

        let mut native = legacy_game("Native");
        native.attributes.remove(ModuleAttributes::IL_ONLY);
        patch_attributes(&mut native, &ctx, "Stub", true);

        assert!(native.is_pure_managed());
        assert_eq!(native.module_attributes, vec![UNVERIFIABLE_CODE_ATTRIBUTE]);
    }
}
