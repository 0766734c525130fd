//! Option to native argument translation
//!
//! Each recipe exposes a table of [`ArgRule`]s. A rule is bound to one option
//! (or to none, for fixed fragments) and renders a list of [`ArgFragment`]s
//! from the option value and the recipe context. The table is evaluated once
//! in declaration order after the build system's common fragments, so the
//! result is a pure function of options, platform and dependency layout.

use crate::build_systems::BuildSystemKind;
use crate::recipe::RecipeContext;
use crucible_types::{BuildType, OptionValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// Smallest unit a rule can contribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgFragment {
    /// Native argument passed verbatim
    Arg(String),
    /// Build system variable (`-DNAME=VALUE` for CMake, `NAME=VALUE` otherwise)
    Define(String, String),
    /// C and C++ compiler flag
    CFlag(String),
    /// Linker flag
    LdFlag(String),
    /// Environment variable for every native command
    Env(String, String),
}

impl ArgFragment {
    #[must_use]
    pub fn arg(value: impl Into<String>) -> Self {
        Self::Arg(value.into())
    }

    #[must_use]
    pub fn define(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Define(name.into(), value.into())
    }

    /// CMake boolean definition
    #[must_use]
    pub fn define_bool(name: impl Into<String>, value: bool) -> Self {
        Self::Define(name.into(), on_off(value).to_string())
    }

    #[must_use]
    pub fn env(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Env(name.into(), value.into())
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

type Render = Box<dyn Fn(Option<&OptionValue>, &RecipeContext<'_>) -> Vec<ArgFragment> + Send + Sync>;

/// One row of a recipe's translation table
pub struct ArgRule {
    /// Option the rule reads; `None` for fixed fragments
    pub option: Option<&'static str>,
    render: Render,
}

impl ArgRule {
    /// Fragments emitted for every configuration
    #[must_use]
    pub fn fixed(
        render: impl Fn(&RecipeContext<'_>) -> Vec<ArgFragment> + Send + Sync + 'static,
    ) -> Self {
        Self {
            option: None,
            render: Box::new(move |_, ctx| render(ctx)),
        }
    }

    /// Rule over one option; skipped when the option is not available
    #[must_use]
    pub fn option(
        option: &'static str,
        render: impl Fn(&OptionValue, &RecipeContext<'_>) -> Vec<ArgFragment> + Send + Sync + 'static,
    ) -> Self {
        Self {
            option: Some(option),
            render: Box::new(move |value, ctx| value.map_or_else(Vec::new, |v| render(v, ctx))),
        }
    }

    /// `-D<define>=ON|OFF` following the option
    #[must_use]
    pub fn cmake_bool(option: &'static str, define: &'static str) -> Self {
        Self::option(option, move |value, _| {
            vec![ArgFragment::define_bool(define, value.is_true())]
        })
    }

    /// `-D<define>=ON|OFF` opposite to the option
    #[must_use]
    pub fn cmake_bool_inverted(option: &'static str, define: &'static str) -> Self {
        Self::option(option, move |value, _| {
            vec![ArgFragment::define_bool(define, !value.is_true())]
        })
    }

    /// `--disable-<feature>` when the option is off, nothing otherwise
    #[must_use]
    pub fn disable_when_off(option: &'static str, feature: &'static str) -> Self {
        Self::option(option, move |value, _| {
            if value.is_true() {
                Vec::new()
            } else {
                vec![ArgFragment::Arg(format!("--disable-{feature}"))]
            }
        })
    }

    /// `--with-<package>` or `--without-<package>`
    #[must_use]
    pub fn with_without(option: &'static str, package: &'static str) -> Self {
        Self::option(option, move |value, _| {
            let prefix = if value.is_true() { "with" } else { "without" };
            vec![ArgFragment::Arg(format!("--{prefix}-{package}"))]
        })
    }

    fn render(&self, ctx: &RecipeContext<'_>) -> Vec<ArgFragment> {
        let value = self.option.and_then(|name| ctx.options.get(name));
        if self.option.is_some() && value.is_none() {
            return Vec::new();
        }
        (self.render)(value, ctx)
    }
}

impl std::fmt::Debug for ArgRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgRule")
            .field("option", &self.option)
            .finish_non_exhaustive()
    }
}

/// Fully translated native invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfiguration {
    pub system: BuildSystemKind,
    pub args: Vec<String>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl BuildConfiguration {
    fn new(system: BuildSystemKind) -> Self {
        Self {
            system,
            args: Vec::new(),
            cflags: Vec::new(),
            ldflags: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    fn push(&mut self, fragment: ArgFragment) {
        match fragment {
            ArgFragment::Arg(arg) => self.args.push(arg),
            ArgFragment::Define(name, value) => match self.system {
                BuildSystemKind::CMake => self.args.push(format!("-D{name}={value}")),
                BuildSystemKind::Autotools | BuildSystemKind::ProjectFile => {
                    self.args.push(format!("{name}={value}"));
                }
            },
            ArgFragment::CFlag(flag) => self.cflags.push(flag),
            ArgFragment::LdFlag(flag) => self.ldflags.push(flag),
            ArgFragment::Env(name, value) => {
                self.env.insert(name, value);
            }
        }
    }
}

/// Fragments every recipe of a build system receives
fn common_fragments(system: BuildSystemKind, ctx: &RecipeContext<'_>) -> Vec<ArgFragment> {
    let platform = ctx.platform;
    let mut fragments = Vec::new();

    match system {
        BuildSystemKind::Autotools => {
            fragments.push(ArgFragment::Arg(format!(
                "--prefix={}",
                ctx.layout.package_dir().display()
            )));
            if platform.is_cross_building() {
                fragments.push(ArgFragment::Arg(format!(
                    "--host={}",
                    platform.target_triple()
                )));
                fragments.push(ArgFragment::Arg(format!(
                    "--build={}",
                    platform.build_triple()
                )));
            }
            if ctx.options.enabled("fPIC") {
                fragments.push(ArgFragment::CFlag("-fPIC".to_string()));
            }
            if platform.build_type == BuildType::Debug {
                fragments.push(ArgFragment::CFlag("-g".to_string()));
            }
        }
        BuildSystemKind::CMake => {
            fragments.push(ArgFragment::define(
                "CMAKE_BUILD_TYPE",
                platform.build_type.to_string(),
            ));
            fragments.push(ArgFragment::define(
                "CMAKE_INSTALL_PREFIX",
                ctx.layout.package_dir().display().to_string(),
            ));
            if let Some(shared) = ctx.options.get("shared") {
                fragments.push(ArgFragment::define_bool(
                    "BUILD_SHARED_LIBS",
                    shared.is_true(),
                ));
            }
            if let Some(fpic) = ctx.options.get("fPIC") {
                fragments.push(ArgFragment::define_bool(
                    "CMAKE_POSITION_INDEPENDENT_CODE",
                    fpic.is_true(),
                ));
            }
        }
        BuildSystemKind::ProjectFile => {
            let config = if platform.build_type == BuildType::Debug {
                "DEBUG"
            } else {
                "RELEASE"
            };
            fragments.push(ArgFragment::env("CONFIG", config));
        }
    }

    fragments
}

/// Translate resolved options into a build configuration
#[must_use]
pub fn translate(
    system: BuildSystemKind,
    rules: &[ArgRule],
    ctx: &RecipeContext<'_>,
) -> BuildConfiguration {
    let mut config = BuildConfiguration::new(system);
    for fragment in common_fragments(system, ctx) {
        config.push(fragment);
    }
    for rule in rules {
        for fragment in rule.render(ctx) {
            config.push(fragment);
        }
    }
    config
}
