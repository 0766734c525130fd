//! Argument translation determinism

use super::support::WidgetRecipe;
use crucible_builder::*;
use crucible_types::{Arch, Os, Platform, UpstreamVersion};
use proptest::prelude::*;
use std::path::Path;

fn configuration(platform: &Platform, overrides: &Overrides) -> BuildConfiguration {
    let recipe = WidgetRecipe::default();
    let options = recipe
        .options()
        .select(platform)
        .resolve("widget", overrides)
        .unwrap();
    let version = UpstreamVersion::parse("1.0").unwrap();
    let layout = WorkLayout::new(Path::new("/work"), "widget", "1.0", "id");
    let deps = DependencyLayouts::default();
    let ctx = RecipeContext {
        name: "widget",
        version: &version,
        platform,
        options: &options,
        dependencies: &deps,
        layout: &layout,
    };
    translate(
        BuildSystemKind::Autotools,
        &recipe.arg_rules(BuildSystemKind::Autotools),
        &ctx,
    )
}

fn arb_platform() -> impl Strategy<Value = Platform> {
    (
        prop_oneof![Just(Os::Linux), Just(Os::Macos)],
        prop_oneof![Just(Arch::X86_64), Just(Arch::Armv8)],
        any::<bool>(),
    )
        .prop_map(|(os, arch, cross)| {
            let platform = Platform::new(os, arch);
            if cross {
                platform.with_build_machine(Os::Linux, Arch::X86_64)
            } else {
                platform
            }
        })
}

proptest! {
    #[test]
    fn prop_translation_is_deterministic(
        platform in arb_platform(),
        shared in any::<bool>(),
        zlib in any::<bool>(),
        extras in any::<bool>(),
    ) {
        let overrides = Overrides::from([
            ("shared".to_string(), shared.to_string()),
            ("with_zlib".to_string(), zlib.to_string()),
            ("with_extras".to_string(), extras.to_string()),
        ]);
        let first = configuration(&platform, &overrides);
        let second = configuration(&platform, &overrides);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.args[0].as_str(), "--prefix=/work/widget/1.0/id/package");
        prop_assert_eq!(first.args.contains(&"--with-zlib".to_string()), zlib);
        prop_assert_eq!(first.args.contains(&"--disable-extras".to_string()), !extras);
    }

    #[test]
    fn prop_dependencies_follow_enabled_features(zlib in any::<bool>(), extras in any::<bool>()) {
        let recipe = WidgetRecipe::default();
        let platform = Platform::new(Os::Linux, Arch::X86_64);
        let resolve_with = |zlib: bool, extras: bool| {
            let overrides = Overrides::from([
                ("with_zlib".to_string(), zlib.to_string()),
                ("with_extras".to_string(), extras.to_string()),
            ]);
            let options = recipe.options().select(&platform).resolve("widget", &overrides).unwrap();
            resolve_requirements("widget", &recipe.requirements(), &options, &platform)
                .unwrap()
                .into_iter()
                .map(|e| e.reference.name)
                .collect::<Vec<_>>()
        };

        let base = resolve_with(zlib, extras);
        let more = resolve_with(true, true);
        for name in &base {
            prop_assert!(more.contains(name));
        }
    }
}
