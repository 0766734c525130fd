//! SOCI, the C++ database access library

use crucible_builder::{
    ArgFragment, ArgRule, BuildSystemKind, ConsumptionMetadata, CopyRule, OptionDecl,
    OptionSchema, PackagePlan, Recipe, RecipeContext, Requirement, SOURCE_SUBFOLDER,
};
use crucible_types::Platform;

#[derive(Debug, Default, Clone, Copy)]
pub struct Soci;

impl Recipe for Soci {
    fn name(&self) -> &'static str {
        "soci"
    }

    fn description(&self) -> &'static str {
        "The C++ Database Access Library"
    }

    fn homepage(&self) -> &'static str {
        "https://github.com/SOCI/soci"
    }

    fn license(&self) -> &'static str {
        "BSL-1.0"
    }

    fn source_table(&self) -> &'static str {
        include_str!("../data/soci.toml")
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new(vec![
            OptionDecl::boolean("shared", true, "Build shared libraries"),
            OptionDecl::boolean("with_boost", false, "Boost integration"),
            OptionDecl::boolean("with_empty", false, "Empty backend"),
            OptionDecl::boolean("with_sqlite3", true, "SQLite3 backend"),
            OptionDecl::boolean("with_mysql", true, "MySQL backend"),
        ])
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::when_option("with_sqlite3", "sqlite3/3.30.1"),
            // the MySQL backend only links against a shared client
            Requirement::when_option("with_mysql", "mysql-connector-c/6.1.11")
                .coerce("shared", "True"),
            Requirement::when_option("with_boost", "boost/1.72.0"),
        ]
    }

    fn build_system(&self, _platform: &Platform) -> BuildSystemKind {
        BuildSystemKind::CMake
    }

    fn arg_rules(&self, _system: BuildSystemKind) -> Vec<ArgRule> {
        vec![
            ArgRule::cmake_bool("shared", "SOCI_SHARED"),
            ArgRule::cmake_bool_inverted("shared", "SOCI_STATIC"),
            ArgRule::fixed(|ctx| {
                ctx.platform
                    .compiler
                    .cppstd
                    .iter()
                    .map(|standard| ArgFragment::define("CMAKE_CXX_STANDARD", standard.as_str()))
                    .collect()
            }),
            ArgRule::cmake_bool("with_empty", "WITH_EMPTY"),
            ArgRule::option("with_sqlite3", |value, ctx| {
                let mut fragments = vec![ArgFragment::define_bool("WITH_SQLITE3", value.is_true())];
                if value.is_true() {
                    if let Some(root) = ctx.dependency_root("sqlite3") {
                        fragments.push(ArgFragment::define("SQLITE_ROOT_DIR", root));
                    }
                }
                fragments
            }),
            ArgRule::option("with_mysql", |value, ctx| {
                let mut fragments = vec![ArgFragment::define_bool("WITH_MYSQL", value.is_true())];
                if value.is_true() {
                    if let Some(root) = ctx.dependency_root("mysql-connector-c") {
                        fragments.push(ArgFragment::env("MYSQL_DIR", root));
                    }
                }
                fragments
            }),
        ]
    }

    fn package_plan(&self, _ctx: &RecipeContext<'_>) -> PackagePlan {
        PackagePlan::default()
            .copy(CopyRule::new("LICENSE_1_0.txt", SOURCE_SUBFOLDER, "licenses"))
            .expect("include/soci/soci.h")
            .expect("lib/*soci_core*")
    }

    fn package_info(&self, ctx: &RecipeContext<'_>, metadata: &mut ConsumptionMetadata) {
        metadata.build_modules.push("cmake/SOCI.cmake".to_string());
        if ctx.enabled("with_boost") {
            metadata.defines.push("SOCI_USE_BOOST".to_string());
        }
    }
}
