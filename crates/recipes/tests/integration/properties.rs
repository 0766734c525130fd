//! Properties every built-in recipe upholds

use crucible_builder::{
    finalize_staging, resolve, ArtifactSet, Linkage, Overrides, PackagePlan, Recipe,
    ResolvedRecipe, WorkLayout,
};
use crucible_config::SourceTable;
use crucible_errors::Error;
use crucible_recipes::Catalog;
use crucible_types::{Arch, Os, OptionDomain, Platform};
use proptest::prelude::*;
use std::sync::Arc;

fn platforms() -> impl Strategy<Value = Platform> {
    prop_oneof![
        Just(Platform::new(Os::Linux, Arch::X86_64)),
        Just(Platform::new(Os::Linux, Arch::Armv8)),
        Just(Platform::new(Os::Macos, Arch::Armv8)),
        Just(Platform::new(Os::Windows, Arch::X86_64)),
    ]
}

fn recipes() -> impl Strategy<Value = Arc<dyn Recipe>> {
    let all: Vec<Arc<dyn Recipe>> = Catalog::builtin().iter().cloned().collect();
    proptest::sample::select(all)
}

fn resolve_latest(
    recipe: &dyn Recipe,
    platform: &Platform,
    overrides: &Overrides,
) -> Result<ResolvedRecipe, Error> {
    let table = SourceTable::from_toml(recipe.name(), recipe.source_table())?;
    let version = table.latest().ok_or_else(|| Error::internal("empty table"))?;
    resolve(recipe, &table, &version, platform, overrides)
}

fn boolean_options(recipe: &dyn Recipe, platform: &Platform) -> Vec<&'static str> {
    recipe
        .options()
        .select(platform)
        .options
        .iter()
        .filter(|d| d.domain == OptionDomain::Bool)
        .map(|d| d.name)
        .collect()
}

/// Build-system leftovers an install step commonly drops into the staging tree
const METADATA_ENTRIES: &[&str] = &[
    "lib/pkgconfig/widget.pc",
    "share/pkgconfig/widget-extra.pc",
    "lib/cmake/Widget/WidgetConfig.cmake",
    "lib/cmake/Widget/WidgetTargets-release.cmake",
    "lib/libwidget.la",
    "lib/sasl2/libplain.la",
    "widget.pc",
    "CMakeFiles/widget.dir/flags.make",
    "src/CMakeFiles/progress.marks",
    "CMakeCache.txt",
    "cmake_install.cmake",
    "src/cmake_install.cmake",
];

const LIBRARIES: &[&str] = &[
    "lib/libwidget.a",
    "lib/libwidget.so",
    "lib/libwidget.so.3",
    "lib/libwidget.so.3.1.0",
    "lib/libwidget.3.dylib",
    "bin/widget.dll",
];

const HEADERS: &[&str] = &["include/widget/widget.h", "include/widget/version.h"];

fn is_build_metadata(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    path.starts_with("lib/pkgconfig/")
        || path.starts_with("share/pkgconfig/")
        || path.starts_with("lib/cmake/")
        || path.split('/').any(|part| part == "CMakeFiles")
        || file.ends_with(".pc")
        || file.ends_with(".la")
        || file == "CMakeCache.txt"
        || file == "cmake_install.cmake"
}

fn is_shared_library(path: &str) -> bool {
    path.ends_with(".so") || path.contains(".so.") || path.ends_with(".dylib") || path.ends_with(".dll")
}

proptest! {
    #[test]
    fn prop_packaging_strips_metadata_and_other_linkage(
        recipe in recipes(),
        platform in platforms(),
        shared in any::<bool>(),
        metadata in proptest::sample::subsequence(METADATA_ENTRIES.to_vec(), 0..=METADATA_ENTRIES.len()),
    ) {
        let has_shared = recipe
            .options()
            .select(&platform)
            .options
            .iter()
            .any(|d| d.name == "shared");
        let mut overrides = Overrides::new();
        if has_shared {
            overrides.insert("shared".to_string(), if shared { "True" } else { "False" }.to_string());
        }
        let Ok(resolved) = resolve_latest(recipe.as_ref(), &platform, &overrides) else {
            return Ok(());
        };

        let work = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(
            work.path(),
            &resolved.name,
            resolved.version.as_str(),
            &resolved.package_id,
        );
        let staging = layout.package_dir();
        for rel in HEADERS.iter().chain(LIBRARIES).chain(&metadata) {
            let path = staging.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"x").unwrap();
        }

        let linkage = Linkage::from_options(&resolved.options);
        let artifacts = finalize_staging(&layout, &PackagePlan::default(), linkage).unwrap();
        prop_assert_eq!(&artifacts, &ArtifactSet::collect(&staging));

        for file in &artifacts.files {
            prop_assert!(!is_build_metadata(file), "{} survived packaging", file);
            match linkage {
                Some(Linkage::Static) => prop_assert!(!is_shared_library(file), "{} kept in a static package", file),
                Some(Linkage::Shared) => prop_assert!(!file.ends_with(".a"), "{} kept in a shared package", file),
                None => {}
            }
        }
        for header in HEADERS {
            prop_assert!(artifacts.contains(header), "{} dropped", header);
        }
        if has_shared {
            prop_assert_eq!(linkage, Some(if shared { Linkage::Shared } else { Linkage::Static }));
        }
    }

    #[test]
    fn prop_defaults_resolve_to_declared_values(recipe in recipes(), platform in platforms()) {
        let schema = recipe.options().select(&platform);
        match resolve_latest(recipe.as_ref(), &platform, &Overrides::new()) {
            Ok(resolved) => {
                prop_assert_eq!(resolved.options.len(), schema.options.len());
                for decl in &schema.options {
                    prop_assert_eq!(resolved.options.get(decl.name), Some(&decl.default));
                }
            }
            // only cyrus-sasl refuses a whole platform
            Err(e) => prop_assert!(e.is_configuration() && recipe.name() == "cyrus-sasl"),
        }
    }

    #[test]
    fn prop_enabling_an_option_never_drops_a_dependency(
        recipe in recipes(),
        platform in platforms(),
        index in any::<prop::sample::Index>(),
    ) {
        let options = boolean_options(recipe.as_ref(), &platform);
        let option = options[index.index(options.len())];

        let off = Overrides::from([(option.to_string(), "False".to_string())]);
        let on = Overrides::from([(option.to_string(), "True".to_string())]);
        let (Ok(off), Ok(on)) = (
            resolve_latest(recipe.as_ref(), &platform, &off),
            resolve_latest(recipe.as_ref(), &platform, &on),
        ) else {
            return Ok(());
        };

        for edge in &off.dependencies {
            prop_assert!(
                on.dependencies.iter().any(|e| e.reference == edge.reference),
                "{}: enabling {} dropped {}", recipe.name(), option, edge.reference
            );
        }
    }

    #[test]
    fn prop_package_id_tracks_options(recipe in recipes(), index in any::<prop::sample::Index>()) {
        let platform = Platform::new(Os::Linux, Arch::X86_64);
        let options = boolean_options(recipe.as_ref(), &platform);
        let option = options[index.index(options.len())];

        let off = Overrides::from([(option.to_string(), "False".to_string())]);
        let on = Overrides::from([(option.to_string(), "True".to_string())]);
        if let (Ok(off), Ok(on)) = (
            resolve_latest(recipe.as_ref(), &platform, &off),
            resolve_latest(recipe.as_ref(), &platform, &on),
        ) {
            prop_assert_ne!(off.package_id, on.package_id);
        }
    }
}
