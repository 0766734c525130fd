//! Target platform descriptor
//!
//! A [`Platform`] is the full set of facts a recipe may branch on: target
//! operating system and architecture, compiler, build type, and the machine
//! the build runs on.

use crate::UpstreamVersion;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target operating system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Macos,
    Windows,
    Freebsd,
}

impl Os {
    /// Operating system of the running binary
    #[must_use]
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else if cfg!(target_os = "freebsd") {
            Self::Freebsd
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "Linux"),
            Self::Macos => write!(f, "Macos"),
            Self::Windows => write!(f, "Windows"),
            Self::Freebsd => write!(f, "FreeBSD"),
        }
    }
}

/// Target CPU architecture
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum Arch {
    #[serde(rename = "x86")]
    #[value(name = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    #[value(name = "x86_64")]
    X86_64,
    #[serde(rename = "armv7")]
    #[value(name = "armv7")]
    Armv7,
    #[serde(rename = "armv8")]
    #[value(name = "armv8")]
    Armv8,
}

impl Arch {
    /// Architecture of the running binary
    #[must_use]
    pub fn host() -> Self {
        if cfg!(target_arch = "x86") {
            Self::X86
        } else if cfg!(target_arch = "aarch64") {
            Self::Armv8
        } else if cfg!(target_arch = "arm") {
            Self::Armv7
        } else {
            Self::X86_64
        }
    }

    /// CPU part of a GNU target triple
    #[must_use]
    pub fn gnu_cpu(self) -> &'static str {
        match self {
            Self::X86 => "i686",
            Self::X86_64 => "x86_64",
            Self::Armv7 => "arm",
            Self::Armv8 => "aarch64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::X86_64 => write!(f, "x86_64"),
            Self::Armv7 => write!(f, "armv7"),
            Self::Armv8 => write!(f, "armv8"),
        }
    }
}

/// Compiler family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerKind {
    Gcc,
    Clang,
    AppleClang,
    /// Microsoft Visual Studio
    Msvc,
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gcc => write!(f, "gcc"),
            Self::Clang => write!(f, "clang"),
            Self::AppleClang => write!(f, "apple-clang"),
            Self::Msvc => write!(f, "Visual Studio"),
        }
    }
}

/// MSVC C runtime flavor
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum Runtime {
    #[value(name = "MT")]
    MT,
    #[value(name = "MTd")]
    MTd,
    #[value(name = "MD")]
    MD,
    #[value(name = "MDd")]
    MDd,
}

impl Runtime {
    /// Name used by MSBuild project files
    #[must_use]
    pub fn msbuild_name(self) -> &'static str {
        match self {
            Self::MT => "MultiThreaded",
            Self::MTd => "MultiThreadedDebug",
            Self::MD => "MultiThreadedDLL",
            Self::MDd => "MultiThreadedDebugDLL",
        }
    }

    /// Whether the runtime is the DLL flavor (`MD`/`MDd`)
    #[must_use]
    pub fn is_dll(self) -> bool {
        matches!(self, Self::MD | Self::MDd)
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Compiler descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiler {
    pub kind: CompilerKind,
    pub version: UpstreamVersion,
    /// Only meaningful for MSVC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Runtime>,
    /// C++ standard, e.g. `14` or `17`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cppstd: Option<String>,
}

impl Compiler {
    /// Create a compiler descriptor without runtime or C++ standard
    #[must_use]
    pub fn new(kind: CompilerKind, version: UpstreamVersion) -> Self {
        Self {
            kind,
            version,
            runtime: None,
            cppstd: None,
        }
    }

    /// Default compiler for an operating system
    #[must_use]
    pub fn default_for(os: Os) -> Self {
        let (kind, version) = match os {
            Os::Linux => (CompilerKind::Gcc, "11"),
            Os::Macos => (CompilerKind::AppleClang, "14"),
            Os::Windows => (CompilerKind::Msvc, "16"),
            Os::Freebsd => (CompilerKind::Clang, "14"),
        };
        let version = UpstreamVersion::parse(version).unwrap_or_else(|_| unreachable!());
        let mut compiler = Self::new(kind, version);
        if kind == CompilerKind::Msvc {
            compiler.runtime = Some(Runtime::MD);
        }
        compiler
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.version)?;
        if let Some(runtime) = self.runtime {
            write!(f, " ({runtime})")?;
        }
        Ok(())
    }
}

/// Build configuration type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum BuildType {
    #[value(name = "Release")]
    Release,
    #[value(name = "Debug")]
    Debug,
    #[value(name = "RelWithDebInfo")]
    RelWithDebInfo,
    #[value(name = "MinSizeRel")]
    MinSizeRel,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Everything a recipe is allowed to know about the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
    pub compiler: Compiler,
    pub build_type: BuildType,
    /// Operating system of the machine running the build
    pub build_os: Os,
    /// Architecture of the machine running the build
    pub build_arch: Arch,
}

impl Platform {
    /// Native build for the given target with its default compiler
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
            compiler: Compiler::default_for(os),
            build_type: BuildType::Release,
            build_os: os,
            build_arch: arch,
        }
    }

    /// Platform describing the running machine
    #[must_use]
    pub fn host() -> Self {
        Self::new(Os::host(), Arch::host())
    }

    /// Replace the compiler
    #[must_use]
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Replace the build type
    #[must_use]
    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = build_type;
        self
    }

    /// Describe the machine running the build
    #[must_use]
    pub fn with_build_machine(mut self, os: Os, arch: Arch) -> Self {
        self.build_os = os;
        self.build_arch = arch;
        self
    }

    /// Whether target and build machine differ
    #[must_use]
    pub fn is_cross_building(&self) -> bool {
        self.os != self.build_os || self.arch != self.build_arch
    }

    /// Target is Windows built with Visual Studio
    #[must_use]
    pub fn is_msvc(&self) -> bool {
        self.os == Os::Windows && self.compiler.kind == CompilerKind::Msvc
    }

    /// Target is Windows built with gcc
    #[must_use]
    pub fn is_mingw(&self) -> bool {
        self.os == Os::Windows && self.compiler.kind == CompilerKind::Gcc
    }

    /// Whether the target OS is Windows
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// GNU triple for the target (used for `--host`)
    #[must_use]
    pub fn target_triple(&self) -> String {
        triple(self.os, self.arch)
    }

    /// GNU triple for the build machine (used for `--build`)
    #[must_use]
    pub fn build_triple(&self) -> String {
        triple(self.build_os, self.build_arch)
    }

    /// Stable one-line description, used for package identity
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!(
            "os={};arch={};compiler={};compiler.version={};compiler.runtime={};compiler.cppstd={};build_type={}",
            self.os,
            self.arch,
            self.compiler.kind,
            self.compiler.version,
            self.compiler
                .runtime
                .map_or_else(String::new, |r| r.to_string()),
            self.compiler.cppstd.as_deref().unwrap_or(""),
            self.build_type,
        )
    }
}

fn triple(os: Os, arch: Arch) -> String {
    let cpu = arch.gnu_cpu();
    match os {
        Os::Linux if arch == Arch::Armv7 => "arm-linux-gnueabihf".to_string(),
        Os::Linux => format!("{cpu}-linux-gnu"),
        Os::Macos => format!("{cpu}-apple-darwin"),
        Os::Windows => format!("{cpu}-w64-mingw32"),
        Os::Freebsd => format!("{cpu}-unknown-freebsd"),
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} / {} / {}",
            self.os, self.arch, self.compiler, self.build_type
        )?;
        if self.is_cross_building() {
            write!(f, " (built on {} {})", self.build_os, self.build_arch)?;
        }
        Ok(())
    }
}
