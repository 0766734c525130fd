//! `RocksDB` embeddable key-value store

use crucible_builder::{
    ArgFragment, ArgRule, BuildSystemKind, ConsumptionMetadata, CopyRule, OptionDecl,
    OptionSchema, PackagePlan, Recipe, RecipeContext, Requirement, ResolvedOptions, SchemaVariant,
    SOURCE_SUBFOLDER,
};
use crucible_errors::ConfigError;
use crucible_types::{Os, Platform, Runtime};

/// Optional compression and tooling backends, option → CMake switch
const BACKENDS: &[(&str, &str)] = &[
    ("with_gflags", "WITH_GFLAGS"),
    ("with_snappy", "WITH_SNAPPY"),
    ("with_lz4", "WITH_LZ4"),
    ("with_zlib", "WITH_ZLIB"),
    ("with_zstd", "WITH_ZSTD"),
    ("with_tbb", "WITH_TBB"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RocksDb;

impl Recipe for RocksDb {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    fn description(&self) -> &'static str {
        "A library that provides an embeddable, persistent key-value store for fast storage"
    }

    fn homepage(&self) -> &'static str {
        "https://github.com/facebook/rocksdb"
    }

    fn license(&self) -> &'static str {
        "GPL-2.0-only OR Apache-2.0"
    }

    fn source_table(&self) -> &'static str {
        include_str!("../data/rocksdb.toml")
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new(vec![
            OptionDecl::boolean("shared", false, "Build shared libraries"),
            OptionDecl::boolean("fPIC", true, "Position independent code"),
            OptionDecl::boolean("lite", false, "Build the reduced ROCKSDB_LITE variant"),
            OptionDecl::boolean("with_gflags", false, "Use gflags"),
            OptionDecl::boolean("with_snappy", false, "Snappy compression"),
            OptionDecl::boolean("with_lz4", false, "LZ4 compression"),
            OptionDecl::boolean("with_zlib", false, "zlib compression"),
            OptionDecl::boolean("with_zstd", false, "Zstandard compression"),
            OptionDecl::boolean("with_tbb", false, "Intel TBB concurrent containers"),
        ])
        .with_variant(SchemaVariant::new("windows", Platform::is_windows).removing(&["fPIC"]))
    }

    fn validate(&self, platform: &Platform, _options: &ResolvedOptions) -> Result<(), ConfigError> {
        if platform.is_msvc() && platform.compiler.version.below("15") {
            return Err(ConfigError::UnsupportedConfiguration {
                recipe: "rocksdb".to_string(),
                reason: format!(
                    "Visual Studio 15 or later is required, got {}",
                    platform.compiler.version
                ),
            });
        }
        Ok(())
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::when_option("with_gflags", "gflags/2.2.2"),
            Requirement::when_option("with_snappy", "snappy/1.1.7"),
            Requirement::when_option("with_lz4", "lz4/1.9.2"),
            Requirement::when_option("with_zlib", "zlib/1.2.11"),
            Requirement::when_option("with_zstd", "zstd/1.3.8"),
            Requirement::when_option("with_tbb", "tbb/2019_u9"),
        ]
    }

    fn build_system(&self, _platform: &Platform) -> BuildSystemKind {
        BuildSystemKind::CMake
    }

    fn arg_rules(&self, _system: BuildSystemKind) -> Vec<ArgRule> {
        let mut rules = vec![
            ArgRule::fixed(|ctx| {
                let platform = ctx.platform;
                let md_runtime =
                    platform.is_msvc() && platform.compiler.runtime.is_some_and(Runtime::is_dll);
                vec![
                    ArgFragment::define_bool("WITH_MD_LIBRARY", md_runtime),
                    ArgFragment::define_bool("ROCKSDB_INSTALL_ON_WINDOWS", platform.is_windows()),
                ]
            }),
            ArgRule::cmake_bool("lite", "ROCKSDB_LITE"),
            ArgRule::fixed(|_| {
                vec![
                    ArgFragment::define_bool("WITH_TESTS", false),
                    ArgFragment::define_bool("WITH_TOOLS", false),
                    ArgFragment::define_bool("WITH_FOLLY_DISTRIBUTED_MUTEX", false),
                ]
            }),
        ];
        rules.extend(
            BACKENDS
                .iter()
                .map(|&(option, define)| ArgRule::cmake_bool(option, define)),
        );
        rules.push(ArgRule::cmake_bool("shared", "ROCKSDB_BUILD_SHARED"));
        rules.push(ArgRule::fixed(|_| {
            vec![
                ArgFragment::define_bool("WITH_BENCHMARK_TOOLS", false),
                ArgFragment::define_bool("WITH_JEMALLOC", false),
                ArgFragment::define_bool("WITH_NUMA", false),
            ]
        }));
        rules
    }

    fn package_plan(&self, _ctx: &RecipeContext<'_>) -> PackagePlan {
        PackagePlan::default()
            .copy(CopyRule::new("COPYING", SOURCE_SUBFOLDER, "licenses"))
            .copy(CopyRule::new("LICENSE*", SOURCE_SUBFOLDER, "licenses"))
            .expect("include/rocksdb/db.h")
            .expect("lib/*rocksdb*")
    }

    fn package_info(&self, ctx: &RecipeContext<'_>, metadata: &mut ConsumptionMetadata) {
        metadata.set_cmake_name("RocksDB");
        match ctx.platform.os {
            Os::Windows => {
                metadata
                    .system_libs
                    .extend(["Shlwapi.lib".to_string(), "Rpcrt4.lib".to_string()]);
                if ctx.enabled("shared") {
                    metadata
                        .defines
                        .extend(["ROCKSDB_DLL".to_string(), "ROCKSDB_LIBRARY_EXPORTS".to_string()]);
                }
            }
            Os::Linux => {
                metadata
                    .system_libs
                    .extend(["pthread".to_string(), "m".to_string()]);
            }
            Os::Macos | Os::Freebsd => {}
        }
        if ctx.enabled("lite") {
            metadata.defines.push("ROCKSDB_LITE".to_string());
        }
    }
}
