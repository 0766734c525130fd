//! Dependency graph over the built-in recipes
//!
//! Starting from one reference, every dependency that is itself a built-in
//! recipe is resolved in turn, with the coercions of the edges pointing at it
//! as its option overrides. A dependency reached with new coercions is
//! resolved again. Dependencies crucible has no recipe for are kept as
//! external leaves.

use crate::catalog::Catalog;
use crucible_builder::{merge_coercions, Overrides, ResolvedRecipe};
use crucible_errors::{ConfigError, Error};
use crucible_types::{PackageRef, Platform};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// One package in the graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub reference: PackageRef,
    /// Options forced by dependents (user overrides for the root)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: Overrides,
    /// Packages that depend on this one
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_by: Vec<String>,
    /// Present for built-in recipes, `None` for external packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedRecipe>,
}

impl GraphNode {
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Resolved dependency graph, root first, in discovery order
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
}

impl DependencyGraph {
    #[must_use]
    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.first()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.reference.name == name)
    }

    /// Built-in recipes ordered so that every dependency comes before its
    /// dependents
    #[must_use]
    pub fn build_order(&self) -> Vec<&GraphNode> {
        let mut ordered: Vec<&GraphNode> = Vec::new();
        let mut remaining: Vec<&GraphNode> = self.nodes.iter().filter(|n| n.is_builtin()).collect();

        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|node| {
                let ready = node.resolved.iter().flat_map(|r| &r.dependencies).all(|edge| {
                    self.get(edge.name()).is_none_or(|dep| {
                        !dep.is_builtin() || ordered.iter().any(|o| o.reference.name == edge.name())
                    })
                });
                if ready {
                    ordered.push(*node);
                }
                !ready
            });
            // recipes never form cycles; bail out rather than spin
            if remaining.len() == before {
                ordered.append(&mut remaining);
            }
        }
        ordered
    }
}

/// Resolve a reference and every built-in recipe it depends on
///
/// # Errors
///
/// Returns any configuration error of a recipe in the graph,
/// `ConfigError::DependencyConflict` when two dependents require different
/// versions of a package or coerce one option to different values, and
/// `SourceError::UnknownVersion` when a built-in dependency is requested at
/// a version its source table does not list.
pub async fn resolve_graph(
    catalog: &Catalog,
    root: &PackageRef,
    platform: &Platform,
    overrides: &Overrides,
) -> Result<DependencyGraph, Error> {
    // Fail fast on an unknown root recipe
    catalog.get(&root.name)?;

    let mut nodes = vec![GraphNode {
        reference: root.clone(),
        overrides: overrides.clone(),
        required_by: Vec::new(),
        resolved: None,
    }];
    let mut pending: VecDeque<usize> = VecDeque::from([0]);

    while let Some(index) = pending.pop_front() {
        let node = &nodes[index];
        let resolved = catalog
            .resolve(&node.reference, platform, &node.overrides)
            .await?;
        let dependent = node.reference.name.clone();

        for edge in &resolved.dependencies {
            let existing = nodes.iter().position(|n| n.reference.name == edge.name());
            match existing {
                Some(position) => {
                    let dep = &mut nodes[position];
                    if dep.reference.version != edge.reference.version {
                        return Err(ConfigError::DependencyConflict {
                            message: format!(
                                "{dependent} requires {} but {} is already required by {}",
                                edge.reference,
                                dep.reference,
                                dep.required_by.join(", ")
                            ),
                        }
                        .into());
                    }
                    let before = dep.overrides.clone();
                    merge_coercions(
                        &dep.reference.to_string(),
                        &mut dep.overrides,
                        edge.coercions.clone(),
                    )?;
                    if !dep.required_by.contains(&dependent) {
                        dep.required_by.push(dependent.clone());
                    }
                    if dep.overrides != before
                        && catalog.contains(edge.name())
                        && !pending.contains(&position)
                    {
                        pending.push_back(position);
                    }
                }
                None => {
                    nodes.push(GraphNode {
                        reference: edge.reference.clone(),
                        overrides: edge.coercions.clone(),
                        required_by: vec![dependent.clone()],
                        resolved: None,
                    });
                    if catalog.contains(edge.name()) {
                        pending.push_back(nodes.len() - 1);
                    }
                }
            }
        }

        nodes[index].resolved = Some(resolved);
    }

    tracing::debug!(
        root = %root,
        nodes = nodes.len(),
        builtin = nodes.iter().filter(|n| n.is_builtin()).count(),
        "dependency graph resolved"
    );
    Ok(DependencyGraph { nodes })
}
