//! Dependency graphs across built-in recipes

use crucible_builder::Overrides;
use crucible_errors::{ConfigError, Error};
use crucible_recipes::{resolve_graph, Catalog};
use crucible_types::{Arch, Os, PackageRef, Platform};

fn linux() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64)
}

#[tokio::test]
async fn test_cyrus_sasl_pulls_in_builtin_libpq() {
    let catalog = Catalog::builtin();
    let overrides = Overrides::from([("with_postgresql".to_string(), "True".to_string())]);
    let graph = resolve_graph(
        &catalog,
        &PackageRef::parse("cyrus-sasl/2.1.27").unwrap(),
        &linux(),
        &overrides,
    )
    .await
    .unwrap();

    let names: Vec<&str> = graph.nodes.iter().map(|n| n.reference.name.as_str()).collect();
    assert_eq!(names, vec!["cyrus-sasl", "libpq", "zlib"]);

    let libpq = graph.get("libpq").unwrap();
    assert!(libpq.is_builtin());
    assert_eq!(libpq.reference.version.as_str(), "11.5");
    assert_eq!(libpq.required_by, vec!["cyrus-sasl"]);
    assert!(!graph.get("zlib").unwrap().is_builtin());

    let order: Vec<&str> = graph
        .build_order()
        .iter()
        .map(|n| n.reference.name.as_str())
        .collect();
    assert_eq!(order, vec!["libpq", "cyrus-sasl"]);
}

#[tokio::test]
async fn test_graph_of_leaf_recipe() {
    let graph = Catalog::builtin()
        .resolve_graph(
            &PackageRef::parse("rocksdb/6.8.1").unwrap(),
            &linux(),
            &Overrides::new(),
        )
        .await
        .unwrap();
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.root().unwrap().reference.name, "rocksdb");
}

#[tokio::test]
async fn test_unknown_root_recipe() {
    let err = resolve_graph(
        &Catalog::builtin(),
        &PackageRef::parse("openssl/1.1.1g").unwrap(),
        &linux(),
        &Overrides::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::UnknownRecipe { .. })));
}

#[tokio::test]
async fn test_builtin_dependency_errors_propagate() {
    // cyrus-sasl is rejected on Windows even when only reached as a root
    let err = resolve_graph(
        &Catalog::builtin(),
        &PackageRef::parse("cyrus-sasl/2.1.27").unwrap(),
        &Platform::new(Os::Windows, Arch::X86_64),
        &Overrides::new(),
    )
    .await
    .unwrap_err();
    assert!(err.is_configuration());
}
