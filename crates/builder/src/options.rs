//! Option model
//!
//! A recipe declares a base option table and a small list of named schema
//! variants. The first variant whose selector matches the platform is applied
//! to the base table before defaults and overrides are resolved; if none
//! matches, the table is used unchanged under the `default` variant name.

use crucible_errors::ConfigError;
use crucible_types::{OptionDomain, OptionValue, Platform};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Raw user overrides, `option name -> value as typed`
pub type Overrides = BTreeMap<String, String>;

/// One declared option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDecl {
    pub name: &'static str,
    pub domain: OptionDomain,
    pub default: OptionValue,
    pub help: &'static str,
}

impl OptionDecl {
    /// Boolean option
    #[must_use]
    pub fn boolean(name: &'static str, default: bool, help: &'static str) -> Self {
        Self {
            name,
            domain: OptionDomain::Bool,
            default: OptionValue::Bool(default),
            help,
        }
    }

    /// Enumerated option; `default` must be one of `choices`
    #[must_use]
    pub fn choice(
        name: &'static str,
        choices: &[&str],
        default: &str,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            domain: OptionDomain::Choice(choices.iter().map(ToString::to_string).collect()),
            default: OptionValue::Choice(default.to_string()),
            help,
        }
    }
}

/// Platform-conditional change to the option table
pub struct SchemaVariant {
    pub name: &'static str,
    selector: fn(&Platform) -> bool,
    removes: Vec<&'static str>,
    adds: Vec<OptionDecl>,
}

impl SchemaVariant {
    #[must_use]
    pub fn new(name: &'static str, selector: fn(&Platform) -> bool) -> Self {
        Self {
            name,
            selector,
            removes: Vec::new(),
            adds: Vec::new(),
        }
    }

    /// Drop options from the base table
    #[must_use]
    pub fn removing(mut self, names: &[&'static str]) -> Self {
        self.removes.extend_from_slice(names);
        self
    }

    /// Extend the base table
    #[must_use]
    pub fn adding(mut self, decl: OptionDecl) -> Self {
        self.adds.push(decl);
        self
    }

    fn matches(&self, platform: &Platform) -> bool {
        (self.selector)(platform)
    }
}

impl std::fmt::Debug for SchemaVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaVariant")
            .field("name", &self.name)
            .field("removes", &self.removes)
            .field("adds", &self.adds)
            .finish_non_exhaustive()
    }
}

/// Base option table plus its variants
#[derive(Debug, Default)]
pub struct OptionSchema {
    base: Vec<OptionDecl>,
    variants: Vec<SchemaVariant>,
}

impl OptionSchema {
    #[must_use]
    pub fn new(base: Vec<OptionDecl>) -> Self {
        Self {
            base,
            variants: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_variant(mut self, variant: SchemaVariant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Whether any variant declares the option
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.base.iter().any(|d| d.name == name)
            || self
                .variants
                .iter()
                .any(|v| v.adds.iter().any(|d| d.name == name))
    }

    /// Select the variant for a platform and build the effective table
    #[must_use]
    pub fn select(&self, platform: &Platform) -> EffectiveSchema {
        let Some(variant) = self.variants.iter().find(|v| v.matches(platform)) else {
            return EffectiveSchema {
                variant: "default",
                options: self.base.clone(),
            };
        };

        let mut options: Vec<OptionDecl> = self
            .base
            .iter()
            .filter(|d| !variant.removes.contains(&d.name))
            .cloned()
            .collect();
        for decl in &variant.adds {
            if let Some(existing) = options.iter_mut().find(|d| d.name == decl.name) {
                *existing = decl.clone();
            } else {
                options.push(decl.clone());
            }
        }

        EffectiveSchema {
            variant: variant.name,
            options,
        }
    }
}

/// Option table after variant selection
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveSchema {
    pub variant: &'static str,
    pub options: Vec<OptionDecl>,
}

impl EffectiveSchema {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionDecl> {
        self.options.iter().find(|d| d.name == name)
    }

    /// Bind every available option to a value
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownOption` for an override naming an option
    /// this variant does not offer, and `ConfigError::InvalidValue` for a
    /// value outside the option's domain.
    pub fn resolve(&self, recipe: &str, overrides: &Overrides) -> Result<ResolvedOptions, ConfigError> {
        let mut parsed = BTreeMap::new();
        for (name, raw) in overrides {
            let decl = self.get(name).ok_or_else(|| ConfigError::UnknownOption {
                recipe: recipe.to_string(),
                option: name.clone(),
            })?;
            parsed.insert(name.as_str(), decl.domain.parse(name, raw)?);
        }

        let values = self
            .options
            .iter()
            .map(|decl| {
                let value = parsed
                    .remove(decl.name)
                    .unwrap_or_else(|| decl.default.clone());
                (decl.name.to_string(), value)
            })
            .collect();

        Ok(ResolvedOptions { values })
    }
}

/// Concrete option values in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedOptions {
    values: Vec<(String, OptionValue)>,
}

impl ResolvedOptions {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Whether the option exists in this configuration
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Boolean value of an option; absent options read as `false`
    #[must_use]
    pub fn enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(OptionValue::is_true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name=value` lines, used for package identity
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by_key(|(n, _)| *n);
        sorted
            .into_iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Values rendered as strings
    #[must_use]
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }
}

impl Serialize for ResolvedOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
