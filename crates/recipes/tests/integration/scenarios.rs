//! Worked examples across resolution, build and packaging

use crucible_builder::{
    BuildSession, CommandOutput, Overrides, RecordingRunner, SessionSettings, WorkLayout,
};
use crucible_errors::{ConfigError, Error};
use crucible_recipes::{resolve_graph, Catalog};
use crucible_types::{Arch, Os, PackageRef, Platform};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn overrides(pairs: &[(&str, &str)]) -> Overrides {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn reference(s: &str) -> PackageRef {
    PackageRef::parse(s).unwrap()
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Runner that simulates `cmake --install` of a rocksdb build with both
/// library flavors
fn rocksdb_installer(staging: PathBuf) -> RecordingRunner {
    RecordingRunner::with_handler(move |cmd| {
        if cmd.program == "cmake" && cmd.args.first().is_some_and(|a| a == "--install") {
            for (rel, contents) in [
                ("include/rocksdb/db.h", "class DB;\n"),
                ("lib/librocksdb.a", "!<arch>\n"),
                ("lib/librocksdb.so", "ELF"),
                ("lib/librocksdb.so.6", "ELF"),
                ("lib/cmake/rocksdb/RocksDBConfig.cmake", "# cmake\n"),
            ] {
                write(&staging, rel, contents);
            }
        }
        CommandOutput::ok()
    })
}

#[tokio::test]
async fn test_rocksdb_static_with_zstd() {
    let catalog = Catalog::builtin();
    let platform = Platform::new(Os::Linux, Arch::X86_64);
    let resolved = catalog
        .resolve(
            &reference("rocksdb/6.8.1"),
            &platform,
            &overrides(&[("shared", "False"), ("with_zstd", "True")]),
        )
        .await
        .unwrap();

    let deps: Vec<String> = resolved
        .dependencies
        .iter()
        .map(|e| e.reference.to_string())
        .collect();
    assert_eq!(deps, vec!["zstd/1.3.8"]);

    let dir = tempfile::tempdir().unwrap();
    let settings = SessionSettings {
        work_root: dir.path().join("work"),
        package_root: dir.path().join("packages"),
        jobs: 4,
        dependency_paths: BTreeMap::new(),
    };
    let layout = WorkLayout::new(&settings.work_root, "rocksdb", "6.8.1", &resolved.package_id);
    write(&layout.source_dir(), "COPYING", "GPLv2\n");
    write(&layout.source_dir(), "LICENSE.Apache", "Apache\n");
    write(&layout.source_dir(), "CMakeLists.txt", "project(rocksdb)\n");

    let runner = Arc::new(rocksdb_installer(layout.package_dir()));
    let session = BuildSession::new(
        catalog.get("rocksdb").unwrap(),
        resolved,
        catalog.source_table("rocksdb").await.unwrap(),
        &settings,
        runner.clone(),
    )
    .unwrap();

    let configure = session.configuration();
    assert!(configure.args.contains(&"-DWITH_ZSTD=ON".to_string()));
    assert!(configure.args.contains(&"-DROCKSDB_BUILD_SHARED=OFF".to_string()));

    session.build().await.unwrap();
    let outcome = session.package().await.unwrap();

    assert_eq!(
        outcome.artifacts.files,
        vec![
            "include/rocksdb/db.h",
            "lib/librocksdb.a",
            "licenses/COPYING",
            "licenses/LICENSE.Apache",
        ]
    );
    assert_eq!(outcome.metadata.libs, vec!["rocksdb"]);
    assert_eq!(outcome.metadata.system_libs, vec!["pthread", "m"]);
    assert!(outcome.path.join("lib/librocksdb.a").is_file());
    assert!(!outcome.path.join("lib/librocksdb.so").exists());
    assert!(!layout.package_dir().exists());

    // configure ran once, out of source
    let configures: Vec<_> = runner
        .commands_for("cmake")
        .into_iter()
        .filter(|c| c.args.first().is_some_and(|a| a == "-S"))
        .collect();
    assert_eq!(configures.len(), 1);
    assert_eq!(configures[0].cwd, layout.build_dir());
}

#[tokio::test]
async fn test_cyrus_sasl_on_windows_fails_before_any_side_effect() {
    let catalog = Catalog::builtin();
    let platform = Platform::new(Os::Windows, Arch::X86_64);
    let err = catalog
        .resolve(&reference("cyrus-sasl/2.1.27"), &platform, &Overrides::new())
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnsupportedConfiguration { recipe, .. }) if recipe == "cyrus-sasl"
    ));
}

#[tokio::test]
async fn test_soci_mysql_coerces_shared_client() {
    let catalog = Catalog::builtin();
    let platform = Platform::new(Os::Linux, Arch::X86_64);
    let resolved = catalog
        .resolve(
            &reference("soci/4.0.0"),
            &platform,
            &overrides(&[("with_mysql", "True")]),
        )
        .await
        .unwrap();

    let mysql = resolved
        .dependencies
        .iter()
        .find(|e| e.name() == "mysql-connector-c")
        .unwrap();
    assert_eq!(mysql.reference.to_string(), "mysql-connector-c/6.1.11");
    assert_eq!(mysql.coercions.get("shared").map(String::as_str), Some("True"));

    let graph = resolve_graph(
        &catalog,
        &reference("soci/4.0.0"),
        &platform,
        &overrides(&[("with_mysql", "True")]),
    )
    .await
    .unwrap();
    let node = graph.get("mysql-connector-c").unwrap();
    assert!(!node.is_builtin());
    assert_eq!(node.overrides.get("shared").map(String::as_str), Some("True"));
    assert_eq!(node.required_by, vec!["soci"]);
}

#[tokio::test]
async fn test_unknown_option_fails_before_any_side_effect() {
    let err = Catalog::builtin()
        .resolve(
            &reference("librdkafka/1.4.2"),
            &Platform::new(Os::Linux, Arch::X86_64),
            &overrides(&[("with_kerberos", "True")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnknownOption { option, .. }) if option == "with_kerberos"
    ));
}

#[tokio::test]
async fn test_removed_option_is_unknown_on_windows() {
    let err = Catalog::builtin()
        .resolve(
            &reference("libpq/12.2"),
            &Platform::new(Os::Windows, Arch::X86_64),
            &overrides(&[("fPIC", "True")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::UnknownOption { .. })));
}
