#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for crucible
//!
//! This crate provides the vocabulary shared by the recipe engine and the
//! recipes: the target platform descriptor, option values and domains,
//! loose upstream version numbers, and package references.

pub mod option;
pub mod platform;
pub mod reference;
pub mod version;

pub use option::{OptionDomain, OptionValue};
pub use platform::{Arch, BuildType, Compiler, CompilerKind, Os, Platform, Runtime};
pub use reference::PackageRef;
pub use version::UpstreamVersion;
