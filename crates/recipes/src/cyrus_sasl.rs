//! Cyrus SASL

use crucible_builder::{
    ArgFragment, ArgRule, BuildPlan, BuildSystemKind, ConsumptionMetadata, CopyRule, NativeCommand,
    OptionDecl, OptionSchema, PackagePlan, Recipe, RecipeContext, Requirement, ResolvedOptions,
    SOURCE_SUBFOLDER,
};
use crucible_errors::ConfigError;
use crucible_types::{Os, Platform};

/// Authentication mechanisms built unless switched off
const MECHANISMS: &[(&str, &str)] = &[
    ("with_cram", "cram"),
    ("with_digest", "digest"),
    ("with_scram", "scram"),
    ("with_otp", "otp"),
    ("with_krb4", "krb4"),
    ("with_gssapi", "gssapi"),
    ("with_plain", "plain"),
    ("with_anon", "anon"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct CyrusSasl;

impl CyrusSasl {
    fn unsupported(reason: &str) -> ConfigError {
        ConfigError::UnsupportedConfiguration {
            recipe: "cyrus-sasl".to_string(),
            reason: reason.to_string(),
        }
    }
}

/// `--with-<flag>=<root>` for a located dependency, bare `--with-<flag>` otherwise
fn with_dependency(option: &'static str, flag: &'static str, dependency: &'static str) -> ArgRule {
    ArgRule::option(option, move |value, ctx| {
        if !value.is_true() {
            return Vec::new();
        }
        let arg = match ctx.dependency_root(dependency) {
            Some(root) => format!("--with-{flag}={root}"),
            None => format!("--with-{flag}"),
        };
        vec![ArgFragment::Arg(arg)]
    })
}

impl Recipe for CyrusSasl {
    fn name(&self) -> &'static str {
        "cyrus-sasl"
    }

    fn description(&self) -> &'static str {
        "Simple Authentication and Security Layer (SASL) library"
    }

    fn homepage(&self) -> &'static str {
        "https://www.cyrusimap.org/sasl/"
    }

    fn license(&self) -> &'static str {
        "BSD-4-Clause"
    }

    fn source_table(&self) -> &'static str {
        include_str!("../data/cyrus-sasl.toml")
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new(vec![
            OptionDecl::boolean("shared", false, "Build shared libraries"),
            OptionDecl::boolean("fPIC", true, "Position independent code"),
            OptionDecl::boolean("with_cram", true, "CRAM-MD5 mechanism"),
            OptionDecl::boolean("with_digest", true, "DIGEST-MD5 mechanism"),
            OptionDecl::boolean("with_scram", true, "SCRAM mechanism"),
            OptionDecl::boolean("with_otp", true, "OTP mechanism"),
            OptionDecl::boolean("with_krb4", true, "KERBEROS_V4 mechanism"),
            OptionDecl::boolean("with_gssapi", true, "GSSAPI mechanism"),
            OptionDecl::boolean("with_plain", true, "PLAIN mechanism"),
            OptionDecl::boolean("with_anon", true, "ANONYMOUS mechanism"),
            OptionDecl::boolean("with_postgresql", false, "PostgreSQL auxprop plugin"),
            OptionDecl::boolean("with_mysql", false, "MySQL auxprop plugin"),
            OptionDecl::boolean("with_ldapdb", false, "LDAPDB auxprop plugin"),
            OptionDecl::boolean("with_bdb", false, "Berkeley DB sasldb backend"),
        ])
    }

    fn validate(&self, platform: &Platform, options: &ResolvedOptions) -> Result<(), ConfigError> {
        if platform.is_windows() {
            return Err(Self::unsupported("Windows is not supported"));
        }
        if options.enabled("with_ldapdb") {
            return Err(Self::unsupported("with_ldapdb is not implemented"));
        }
        if options.enabled("with_bdb") {
            return Err(Self::unsupported("with_bdb is not implemented"));
        }
        Ok(())
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::when_option("with_postgresql", "libpq/11.5"),
            Requirement::when_option("with_mysql", "libmysqlclient/8.0.17"),
        ]
    }

    fn build_requirements(&self, platform: &Platform) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if platform.build_os == Os::Windows {
            tools.push("msys2/20190524");
        }
        tools.extend(["autoconf/2.69", "m4/1.4.18", "libtool/2.4.6"]);
        tools
    }

    fn build_system(&self, _platform: &Platform) -> BuildSystemKind {
        BuildSystemKind::Autotools
    }

    fn arg_rules(&self, _system: BuildSystemKind) -> Vec<ArgRule> {
        let mut rules = vec![ArgRule::option("shared", |value, _| {
            let args = if value.is_true() {
                ["--enable-shared", "--disable-static"]
            } else {
                ["--disable-shared", "--enable-static"]
            };
            args.into_iter().map(ArgFragment::arg).collect()
        })];
        rules.extend(
            MECHANISMS
                .iter()
                .map(|&(option, feature)| ArgRule::disable_when_off(option, feature)),
        );
        rules.push(with_dependency("with_postgresql", "pgsql", "libpq"));
        rules.push(with_dependency("with_mysql", "mysql", "libmysqlclient"));
        rules
    }

    fn build_plan(&self, ctx: &RecipeContext<'_>) -> BuildPlan {
        let autogen = NativeCommand::new("sh", ctx.layout.source_dir())
            .arg("./autogen.sh")
            .env("NOCONFIGURE", "YES");
        BuildPlan {
            tools: vec!["autoreconf"],
            bootstrap: vec![autogen],
            ..BuildPlan::default()
        }
    }

    fn package_plan(&self, _ctx: &RecipeContext<'_>) -> PackagePlan {
        PackagePlan::default()
            .copy(CopyRule::new("COPYING", SOURCE_SUBFOLDER, "licenses"))
            .remove("share")
            .remove("etc")
            .expect("include/sasl/sasl.h")
            .expect("lib/libsasl2.*")
    }

    fn package_info(&self, _ctx: &RecipeContext<'_>, _metadata: &mut ConsumptionMetadata) {}
}
