//! librdkafka, the Apache Kafka C/C++ client

use crucible_builder::{
    ArgFragment, ArgRule, BuildSystemKind, ConsumptionMetadata, CopyRule, OptionDecl,
    OptionSchema, PackagePlan, Recipe, RecipeContext, Requirement, SchemaVariant,
    SOURCE_SUBFOLDER,
};
use crucible_types::{BuildType, Platform};

#[derive(Debug, Default, Clone, Copy)]
pub struct Librdkafka;

impl Recipe for Librdkafka {
    fn name(&self) -> &'static str {
        "librdkafka"
    }

    fn description(&self) -> &'static str {
        "The Apache Kafka C/C++ library"
    }

    fn homepage(&self) -> &'static str {
        "https://github.com/edenhill/librdkafka"
    }

    fn license(&self) -> &'static str {
        "BSD-2-Clause"
    }

    fn source_table(&self) -> &'static str {
        include_str!("../data/librdkafka.toml")
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new(vec![
            OptionDecl::boolean("shared", false, "Build shared libraries"),
            OptionDecl::boolean("fPIC", true, "Position independent code"),
            OptionDecl::boolean("with_ssl", true, "SSL transport"),
            OptionDecl::boolean("with_lz4", true, "LZ4 compression"),
            OptionDecl::boolean("with_zlib", true, "zlib compression"),
            OptionDecl::boolean("with_zstd", true, "Zstandard compression"),
            OptionDecl::boolean("with_plugins", true, "Plugin loading"),
            OptionDecl::boolean("with_sasl", true, "SASL authentication"),
        ])
        .with_variant(SchemaVariant::new("windows", Platform::is_windows).removing(&["fPIC"]))
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::when_option("with_zlib", "zlib/1.2.11"),
            Requirement::when_option("with_zstd", "zstd/1.4.4"),
            Requirement::always("lz4/1.9.2"),
            Requirement::always("openssl/1.1.1g"),
        ]
    }

    fn build_system(&self, _platform: &Platform) -> BuildSystemKind {
        BuildSystemKind::CMake
    }

    fn arg_rules(&self, _system: BuildSystemKind) -> Vec<ArgRule> {
        vec![
            ArgRule::fixed(|ctx| {
                vec![ArgFragment::define_bool(
                    "WITHOUT_OPTIMIZATION",
                    ctx.platform.build_type == BuildType::Debug,
                )]
            }),
            ArgRule::cmake_bool("with_zlib", "WITH_ZLIB"),
            ArgRule::cmake_bool("with_zstd", "WITH_ZSTD"),
            ArgRule::cmake_bool("with_plugins", "WITH_PLUGINS"),
            ArgRule::cmake_bool("with_sasl", "WITH_SASL"),
            ArgRule::fixed(|_| vec![ArgFragment::define("ENABLE_LZ4_EXT", "YES")]),
            ArgRule::option("shared", |value, _| {
                let build_static = if value.is_true() { "NO" } else { "YES" };
                vec![ArgFragment::define("RDKAFKA_BUILD_STATIC", build_static)]
            }),
            ArgRule::fixed(|_| {
                vec![
                    ArgFragment::define("RDKAFKA_BUILD_EXAMPLES", "NO"),
                    ArgFragment::define("RDKAFKA_BUILD_TESTS", "NO"),
                ]
            }),
        ]
    }

    fn package_plan(&self, _ctx: &RecipeContext<'_>) -> PackagePlan {
        PackagePlan::default()
            .copy(CopyRule::new("LICENSE", SOURCE_SUBFOLDER, "licenses"))
            .expect("include/librdkafka/rdkafka.h")
            .expect("lib/*rdkafka*")
    }

    fn package_info(&self, ctx: &RecipeContext<'_>, metadata: &mut ConsumptionMetadata) {
        metadata.set_cmake_name("RdKafka");
        metadata
            .requires
            .extend(["openssl::SSL".to_string(), "lz4::lz4".to_string()]);
        if ctx.enabled("with_zlib") {
            metadata.requires.push("zlib::zlib".to_string());
        }
        if ctx.enabled("with_zstd") {
            metadata.requires.push("zstd::zstd".to_string());
        }
    }
}
