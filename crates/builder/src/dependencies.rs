//! Conditional dependency table

use crate::options::ResolvedOptions;
use crucible_errors::ConfigError;
use crucible_types::{OptionDomain, PackageRef, Platform};
use serde::Serialize;
use std::collections::BTreeMap;

type Predicate = Box<dyn Fn(&ResolvedOptions, &Platform) -> bool + Send + Sync>;

/// When a requirement is active
pub enum Condition {
    Always,
    /// Active when the boolean option is enabled
    Option(&'static str),
    Custom(Predicate),
}

impl Condition {
    fn holds(&self, options: &ResolvedOptions, platform: &Platform) -> bool {
        match self {
            Self::Always => true,
            Self::Option(name) => options.enabled(name),
            Self::Custom(predicate) => predicate(options, platform),
        }
    }

    fn describe(&self) -> Option<String> {
        match self {
            Self::Always => None,
            Self::Option(name) => Some(format!("{name}=True")),
            Self::Custom(_) => Some("platform".to_string()),
        }
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Option(name) => write!(f, "Option({name})"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// One row of a recipe's dependency table
#[derive(Debug)]
pub struct Requirement {
    pub reference: &'static str,
    pub condition: Condition,
    /// Option values forced onto the dependency
    pub coercions: Vec<(&'static str, &'static str)>,
}

impl Requirement {
    #[must_use]
    pub fn always(reference: &'static str) -> Self {
        Self {
            reference,
            condition: Condition::Always,
            coercions: Vec::new(),
        }
    }

    #[must_use]
    pub fn when_option(option: &'static str, reference: &'static str) -> Self {
        Self {
            reference,
            condition: Condition::Option(option),
            coercions: Vec::new(),
        }
    }

    #[must_use]
    pub fn when(
        predicate: impl Fn(&ResolvedOptions, &Platform) -> bool + Send + Sync + 'static,
        reference: &'static str,
    ) -> Self {
        Self {
            reference,
            condition: Condition::Custom(Box::new(predicate)),
            coercions: Vec::new(),
        }
    }

    /// Force an option value on the dependency
    #[must_use]
    pub fn coerce(mut self, option: &'static str, value: &'static str) -> Self {
        self.coercions.push((option, value));
        self
    }
}

/// An active dependency with exact version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub reference: PackageRef,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub coercions: BTreeMap<String, String>,
    /// Condition that activated the edge, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_by: Option<String>,
}

impl DependencyEdge {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.reference.name
    }
}

/// Evaluate a dependency table in declaration order
///
/// Edges naming the same package are merged; differing versions or
/// contradicting coercions are a conflict.
///
/// # Errors
///
/// Returns `ConfigError::InvalidReference` for a malformed table entry and
/// `ConfigError::DependencyConflict` for contradicting edges.
pub fn resolve_requirements(
    recipe: &str,
    table: &[Requirement],
    options: &ResolvedOptions,
    platform: &Platform,
) -> Result<Vec<DependencyEdge>, ConfigError> {
    let mut edges: Vec<DependencyEdge> = Vec::new();

    for requirement in table {
        if !requirement.condition.holds(options, platform) {
            continue;
        }
        let reference = PackageRef::parse(requirement.reference)?;
        let coercions: BTreeMap<String, String> = requirement
            .coercions
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        if let Some(existing) = edges
            .iter_mut()
            .find(|e| e.reference.name == reference.name)
        {
            if existing.reference.version != reference.version {
                return Err(ConfigError::DependencyConflict {
                    message: format!(
                        "{recipe} requires both {} and {reference}",
                        existing.reference
                    ),
                });
            }
            merge_coercions(&reference.to_string(), &mut existing.coercions, coercions)?;
            continue;
        }

        edges.push(DependencyEdge {
            reference,
            coercions,
            activated_by: requirement.condition.describe(),
        });
    }

    tracing::debug!(recipe, count = edges.len(), "dependencies resolved");
    Ok(edges)
}

/// Merge coercions for the same package, rejecting contradictions
///
/// # Errors
///
/// Returns `ConfigError::DependencyConflict` when one option is forced to two
/// different values.
pub fn merge_coercions(
    package: &str,
    into: &mut BTreeMap<String, String>,
    from: BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (option, value) in from {
        match into.get(&option) {
            Some(current) if same_option_value(current, &value) => {}
            Some(current) => {
                return Err(ConfigError::DependencyConflict {
                    message: format!(
                        "{package}: option {option} coerced to both {current} and {value}"
                    ),
                })
            }
            None => {
                into.insert(option, value);
            }
        }
    }
    Ok(())
}

/// Whether two option spellings denote the same value
///
/// Boolean spellings (`True`, `1`, `on`, ...) compare by meaning, anything
/// else compares exactly.
#[must_use]
pub fn same_option_value(left: &str, right: &str) -> bool {
    match (
        OptionDomain::Bool.parse("", left),
        OptionDomain::Bool.parse("", right),
    ) {
        (Ok(l), Ok(r)) => l == r,
        _ => left.trim() == right.trim(),
    }
}
