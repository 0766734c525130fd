//! libpq, the PostgreSQL client library
//!
//! POSIX and MinGW builds run the autotools flow, but only in the handful of
//! subdirectories libpq needs (the full server is never built). MSVC builds
//! use PostgreSQL's own perl driver in `src/tools/msvc`, which has no install
//! step: headers and libraries are copied out of the tree by the package
//! plan.

use crucible_builder::{
    ArgFragment, ArgRule, BuildPlan, BuildSystemKind, ConsumptionMetadata, CopyRule, OptionDecl,
    OptionSchema, PackagePlan, Recipe, RecipeContext, Requirement, SchemaVariant, Step,
    TextSubstitution, SOURCE_SUBFOLDER,
};
use crucible_types::{Arch, BuildType, CompilerKind, Os, Platform, Runtime};

const MSVC_TOOLS: &str = "src/tools/msvc";
const WINDOWS_SYSTEM_LIBS: &[&str] = &[
    "ws2_32", "secur32", "advapi32", "shell32", "crypt32", "wldap32",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct Libpq;

/// `--with-<package>` plus include and library paths of the located
/// dependency, or `--without-<package>`
fn with_dependency(option: &'static str, package: &'static str) -> ArgRule {
    ArgRule::option(option, move |value, ctx| {
        if !value.is_true() {
            return vec![ArgFragment::Arg(format!("--without-{package}"))];
        }
        let mut fragments = vec![ArgFragment::Arg(format!("--with-{package}"))];
        if let Some(layout) = ctx.dependencies.get(package) {
            fragments.push(ArgFragment::CFlag(format!(
                "-I{}",
                layout.include_dir().display()
            )));
            fragments.push(ArgFragment::LdFlag(format!(
                "-L{}",
                layout.lib_dir().display()
            )));
        }
        fragments
    })
}

fn is_clang8_x86(platform: &Platform) -> bool {
    platform.os == Os::Linux
        && platform.compiler.kind == CompilerKind::Clang
        && platform.compiler.version.as_str() == "8"
        && platform.arch == Arch::X86
}

/// Library name as the platform's linker expects it
fn library_name(ctx: &RecipeContext<'_>, name: &str) -> String {
    if ctx.platform.is_msvc() {
        format!("lib{name}")
    } else {
        name.to_string()
    }
}

fn msvc_file(name: &str) -> String {
    format!("{MSVC_TOOLS}/{name}")
}

fn msvc_substitutions(ctx: &RecipeContext<'_>) -> Vec<TextSubstitution> {
    let mut subs = Vec::new();
    let solution = msvc_file("Solution.pm");
    let config_default = msvc_file("config_default.pl");

    if !ctx.enabled("shared") {
        subs.push(TextSubstitution::new(
            msvc_file("MKvcbuild.pm"),
            "$libpq = $solution->AddProject('libpq', 'dll', 'interfaces',",
            "$libpq = $solution->AddProject('libpq', 'lib', 'interfaces',",
        ));
    }

    let runtime = ctx
        .platform
        .compiler
        .runtime
        .unwrap_or(Runtime::MD)
        .msbuild_name();
    let project = msvc_file("MSBuildProject.pm");
    for search in ["'MultiThreadedDebugDLL'", "'MultiThreadedDLL'"] {
        subs.push(TextSubstitution::new(&project, search, format!("'{runtime}'")));
    }

    if ctx.enabled("with_zlib") {
        let zlib = if ctx.platform.build_type == BuildType::Debug {
            "zlibd"
        } else {
            "zlib"
        };
        subs.push(TextSubstitution::new(&solution, "zdll.lib", format!("{zlib}.lib")));
        match ctx.dependencies.get("zlib") {
            Some(layout) => subs.push(TextSubstitution::new(
                &config_default,
                "zlib      => undef",
                format!("zlib      => '{}'", layout.root_forward_slashes()),
            )),
            None => tracing::warn!(recipe = "libpq", "zlib not packaged, config_default.pl left unchanged"),
        }
    }

    if ctx.enabled("with_openssl") {
        for ssl in [r"VC\libssl32", r"VC\libssl64", "libssl"] {
            subs.push(TextSubstitution::new(&solution, format!("{ssl}.lib"), "libssl.lib"));
        }
        for crypto in [r"VC\libcrypto32", r"VC\libcrypto64", "libcrypto"] {
            subs.push(TextSubstitution::new(
                &solution,
                format!("{crypto}.lib"),
                "libcrypto.lib",
            ));
        }
        match ctx.dependencies.get("openssl") {
            Some(layout) => subs.push(TextSubstitution::new(
                &config_default,
                "openssl   => undef",
                format!("openssl   => '{}'", layout.root_forward_slashes()),
            )),
            None => tracing::warn!(recipe = "libpq", "openssl not packaged, config_default.pl left unchanged"),
        }
    }

    subs
}

impl Recipe for Libpq {
    fn name(&self) -> &'static str {
        "libpq"
    }

    fn description(&self) -> &'static str {
        "The library used by all the standard PostgreSQL tools"
    }

    fn homepage(&self) -> &'static str {
        "https://www.postgresql.org/docs/current/static/libpq.html"
    }

    fn license(&self) -> &'static str {
        "PostgreSQL"
    }

    fn source_table(&self) -> &'static str {
        include_str!("../data/libpq.toml")
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new(vec![
            OptionDecl::boolean("shared", false, "Build shared libraries"),
            OptionDecl::boolean("fPIC", true, "Position independent code"),
            OptionDecl::boolean("with_zlib", true, "zlib compression"),
            OptionDecl::boolean("with_openssl", false, "SSL connections"),
            OptionDecl::boolean("disable_rpath", false, "Do not embed rpath in binaries"),
        ])
        .with_variant(
            SchemaVariant::new("windows", Platform::is_windows)
                .removing(&["fPIC", "disable_rpath"]),
        )
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::when_option("with_zlib", "zlib/1.2.11"),
            Requirement::when_option("with_openssl", "openssl/1.1.1g"),
        ]
    }

    fn build_requirements(&self, platform: &Platform) -> Vec<&'static str> {
        if platform.is_msvc() {
            vec!["strawberryperl/5.30.0.1"]
        } else if platform.build_os == Os::Windows {
            vec!["msys2/20190524"]
        } else {
            Vec::new()
        }
    }

    fn build_system(&self, platform: &Platform) -> BuildSystemKind {
        if platform.is_msvc() {
            BuildSystemKind::ProjectFile
        } else {
            BuildSystemKind::Autotools
        }
    }

    fn arg_rules(&self, system: BuildSystemKind) -> Vec<ArgRule> {
        if system != BuildSystemKind::Autotools {
            return Vec::new();
        }
        vec![
            ArgRule::fixed(|_| vec![ArgFragment::arg("--without-readline")]),
            with_dependency("with_zlib", "zlib"),
            with_dependency("with_openssl", "openssl"),
            ArgRule::fixed(|ctx| {
                if ctx.platform.is_cross_building() && !ctx.enabled("with_openssl") {
                    vec![ArgFragment::arg("--disable-strong-random")]
                } else {
                    Vec::new()
                }
            }),
            ArgRule::option("disable_rpath", |value, ctx| {
                if value.is_true() && !ctx.platform.is_windows() {
                    vec![ArgFragment::arg("--disable-rpath")]
                } else {
                    Vec::new()
                }
            }),
            ArgRule::fixed(|ctx| {
                if is_clang8_x86(ctx.platform) {
                    vec![ArgFragment::CFlag("-msse2".to_string())]
                } else {
                    Vec::new()
                }
            }),
        ]
    }

    fn substitutions(&self, ctx: &RecipeContext<'_>) -> Vec<TextSubstitution> {
        if ctx.platform.is_mingw() {
            vec![TextSubstitution::new("configure", "-lz ", "-lzlib ")]
        } else if ctx.platform.is_msvc() {
            msvc_substitutions(ctx)
        } else {
            Vec::new()
        }
    }

    fn build_plan(&self, ctx: &RecipeContext<'_>) -> BuildPlan {
        if ctx.platform.is_msvc() {
            let mut build = vec![Step::in_dir_target(MSVC_TOOLS, "libpq")];
            if !ctx.enabled("shared") {
                build.push(Step::in_dir_target(MSVC_TOOLS, "libpgport"));
            }
            return BuildPlan {
                build,
                install: Vec::new(),
                ..BuildPlan::default()
            };
        }

        let with_port = ctx.version.at_least("12");
        let mut build = vec![
            Step::in_dir_target("src/backend", "generated-headers"),
            Step::in_dir("src/common"),
        ];
        if with_port {
            build.push(Step::in_dir("src/port"));
        }
        build.extend([
            Step::in_dir("src/include"),
            Step::in_dir("src/interfaces/libpq"),
            Step::in_dir("src/bin/pg_config"),
        ]);

        let mut install = vec![
            Step::in_dir("src/common"),
            Step::in_dir("src/include"),
            Step::in_dir("src/interfaces/libpq"),
        ];
        if with_port {
            install.push(Step::in_dir("src/port"));
        }
        install.push(Step::in_dir("src/bin/pg_config"));

        BuildPlan {
            build,
            install,
            ..BuildPlan::default()
        }
    }

    fn package_plan(&self, ctx: &RecipeContext<'_>) -> PackagePlan {
        let shared = ctx.enabled("shared");
        let mut plan =
            PackagePlan::default().copy(CopyRule::new("COPYRIGHT", SOURCE_SUBFOLDER, "licenses"));

        if ctx.platform.is_msvc() {
            for header in [
                "*postgres_ext.h",
                "*pg_config.h",
                "*pg_config_ext.h",
                "*libpq-fe.h",
                "*libpq-events.h",
            ] {
                plan = plan.copy(CopyRule::new(header, SOURCE_SUBFOLDER, "include").flat());
            }
            plan = plan.copy(
                CopyRule::new(
                    "*.h",
                    &format!("{SOURCE_SUBFOLDER}/src/include/libpq"),
                    "include/libpq",
                )
                .flat(),
            );
            for header in ["*genbki.h", "*pg_type.h"] {
                plan = plan.copy(CopyRule::new(header, SOURCE_SUBFOLDER, "include/catalog").flat());
            }
            plan = if shared {
                plan.copy(CopyRule::new("**/libpq.dll", SOURCE_SUBFOLDER, "bin").flat())
                    .copy(CopyRule::new("**/libpq.lib", SOURCE_SUBFOLDER, "lib").flat())
                    .expect("bin/libpq.dll")
            } else {
                plan.copy(CopyRule::new("*.lib", SOURCE_SUBFOLDER, "lib").flat())
            };
        } else {
            plan = plan.remove("include/postgresql/server").copy(CopyRule::new(
                "*.h",
                &format!("{SOURCE_SUBFOLDER}/src/include/catalog"),
                "include/catalog",
            ));
        }

        plan.copy(CopyRule::new(
            "*.h",
            &format!("{SOURCE_SUBFOLDER}/src/backend/catalog"),
            "include/catalog",
        ))
        .remove("share")
        .expect("include/libpq-fe.h")
        .expect("lib/*pq.*")
    }

    fn package_info(&self, ctx: &RecipeContext<'_>, metadata: &mut ConsumptionMetadata) {
        metadata.set_cmake_name("PostgreSQL");
        metadata
            .env
            .insert("PostgreSQL_ROOT".to_string(), ".".to_string());

        let pq_lib = library_name(ctx, "pq");
        let msvc = ctx.platform.is_msvc();
        let before_12 = ctx.version.below("12");

        let pq = metadata.component("pq");
        pq.libs = vec![pq_lib];
        if ctx.enabled("with_zlib") {
            pq.requires.push("zlib::zlib".to_string());
        }
        if ctx.enabled("with_openssl") {
            pq.requires.push("openssl::openssl".to_string());
        }
        match ctx.platform.os {
            Os::Linux => pq.system_libs = vec!["pthread".to_string()],
            Os::Windows => {
                pq.system_libs = WINDOWS_SYSTEM_LIBS.iter().map(ToString::to_string).collect();
            }
            Os::Macos | Os::Freebsd => {}
        }

        if ctx.enabled("shared") {
            return;
        }

        let (internal, pq_requires): (Vec<(&str, Vec<&str>)>, Vec<&str>) = match (msvc, before_12) {
            (true, true) => (vec![("pgport", vec!["libpgport"])], vec!["pgport"]),
            (true, false) => (
                vec![
                    ("pgcommon", vec!["libpgcommon"]),
                    ("pgport", vec!["libpgport"]),
                ],
                vec!["pgport", "pgcommon"],
            ),
            (false, true) => (vec![("pgcommon", vec!["pgcommon"])], vec!["pgcommon"]),
            (false, false) => (
                vec![
                    ("pgcommon", vec!["pgcommon", "pgcommon_shlib"]),
                    ("pgport", vec!["pgport", "pgport_shlib"]),
                ],
                vec!["pgport", "pgcommon"],
            ),
        };

        for (name, libs) in internal {
            metadata.component(name).libs = libs.into_iter().map(ToString::to_string).collect();
        }
        metadata
            .component("pq")
            .requires
            .extend(pq_requires.into_iter().map(ToString::to_string));
    }
}
