//! End-to-end session flow with a recording runner

use super::support::{cached_widget_source, installing_runner, WidgetRecipe};
use crucible_builder::*;
use crucible_config::SourceTable;
use crucible_errors::{BuildError, Error, PackageError};
use crucible_net::NetClient;
use crucible_types::{Arch, Os, Platform, UpstreamVersion};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Fixture {
    _dir: tempfile::TempDir,
    settings: SessionSettings,
    fetcher: SourceFetcher,
    table: SourceTable,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let table = cached_widget_source(&cache, "widget-1.0");
    let settings = SessionSettings {
        work_root: dir.path().join("work"),
        package_root: dir.path().join("packages"),
        jobs: 2,
        dependency_paths: BTreeMap::new(),
    };
    let fetcher =
        SourceFetcher::new(NetClient::with_defaults().unwrap(), cache).with_network_access(false);
    Fixture {
        _dir: dir,
        settings,
        fetcher,
        table,
    }
}

fn linux() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64)
}

fn resolved(recipe: &WidgetRecipe, table: &SourceTable, overrides: &[(&str, &str)]) -> ResolvedRecipe {
    let overrides: Overrides = overrides
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    resolve(
        recipe,
        table,
        &UpstreamVersion::parse("1.0").unwrap(),
        &linux(),
        &overrides,
    )
    .unwrap()
}

fn staging_for(settings: &SessionSettings, resolved: &ResolvedRecipe) -> std::path::PathBuf {
    WorkLayout::new(&settings.work_root, "widget", "1.0", &resolved.package_id).package_dir()
}

fn configure_count(runner: &RecordingRunner) -> usize {
    runner
        .commands_for("sh")
        .iter()
        .filter(|c| c.args.first().is_some_and(|a| a == "./configure"))
        .count()
}

#[tokio::test]
async fn test_create_publishes_filtered_package() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let resolved = resolved(&recipe, &fx.table, &[]);
    let runner = Arc::new(installing_runner(staging_for(&fx.settings, &resolved)));

    let session = BuildSession::new(
        Arc::new(WidgetRecipe::default()),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner.clone(),
    )
    .unwrap();
    let outcome = session.create(&fx.fetcher).await.unwrap();

    assert_eq!(
        outcome.artifacts.files,
        vec!["include/widget.h", "lib/libwidget.a", "licenses/LICENSE"]
    );
    assert!(outcome.path.join("crucible-package.json").is_file());
    assert!(outcome.path.join("lib/libwidget.a").is_file());
    assert!(!outcome.path.join("lib/libwidget.so").exists());
    assert!(!outcome.path.join("lib/pkgconfig").exists());
    assert!(!session.layout().package_dir().exists());

    assert_eq!(outcome.metadata.libs, vec!["widget"]);
    assert_eq!(outcome.metadata.system_libs, vec!["pthread"]);
    assert_eq!(
        outcome.metadata.names.get("cmake_find_package").map(String::as_str),
        Some("Widget")
    );

    let configure = runner.commands_for("sh");
    assert!(configure[0].args.contains(&"--with-zlib".to_string()));
    assert!(configure[0].args.contains(&"--disable-extras".to_string()));

    let patched = std::fs::read_to_string(session.layout().source_path("configure")).unwrap();
    assert!(patched.contains("-lzlib -lm"));
}

#[tokio::test]
async fn test_configure_runs_once_across_build_and_package() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let resolved = resolved(&recipe, &fx.table, &[]);
    let runner = Arc::new(installing_runner(staging_for(&fx.settings, &resolved)));
    let session = BuildSession::new(
        Arc::new(WidgetRecipe::default()),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner.clone(),
    )
    .unwrap();

    session.fetch_source(&fx.fetcher).await.unwrap();
    session.apply_patches().await.unwrap();
    session.build().await.unwrap();
    session.build().await.unwrap();
    session.package().await.unwrap();

    assert_eq!(configure_count(&runner), 1);
}

#[tokio::test]
async fn test_missing_artifact_publishes_nothing() {
    let fx = fixture();
    let recipe = WidgetRecipe {
        expected: vec!["include/widget.h", "bin/widget-tool"],
        ..WidgetRecipe::default()
    };
    let resolved = resolved(&recipe, &fx.table, &[]);
    let runner = Arc::new(installing_runner(staging_for(&fx.settings, &resolved)));
    let session = BuildSession::new(
        Arc::new(recipe),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner,
    )
    .unwrap();

    let err = session.create(&fx.fetcher).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Package(PackageError::MissingArtifact { ref pattern }) if pattern == "bin/widget-tool"
    ));
    assert!(!session.package_dir().exists());
    assert!(!session.layout().package_dir().exists());
}

#[tokio::test]
async fn test_stale_substitution_aborts_before_configure() {
    let fx = fixture();
    let recipe = WidgetRecipe {
        substitutions: vec![TextSubstitution::new("configure", "-lpthread", "-lwinpthread")],
        ..WidgetRecipe::default()
    };
    let resolved = resolved(&recipe, &fx.table, &[]);
    let runner = Arc::new(RecordingRunner::new());
    let session = BuildSession::new(
        Arc::new(recipe),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner.clone(),
    )
    .unwrap();

    let err = session.create(&fx.fetcher).await.unwrap_err();
    assert!(matches!(err, Error::Build(BuildError::PatchFailed { .. })));
    assert_eq!(configure_count(&runner), 0);
}

#[tokio::test]
async fn test_build_failure_is_fatal() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let resolved = resolved(&recipe, &fx.table, &[]);
    let runner = Arc::new(RecordingRunner::with_handler(|cmd| {
        if cmd.program == "make" {
            CommandOutput::failed(2, "widget.c:1: error: expected ';'")
        } else {
            CommandOutput::ok()
        }
    }));
    let session = BuildSession::new(
        Arc::new(WidgetRecipe::default()),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner,
    )
    .unwrap();

    let err = session.create(&fx.fetcher).await.unwrap_err();
    assert!(matches!(err, Error::Build(BuildError::CompileFailed { ref message }) if message.contains("expected ';'")));
    assert!(!session.package_dir().exists());
}

#[tokio::test]
async fn test_missing_tool_is_reported_before_any_work() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let resolved = resolved(&recipe, &fx.table, &[]);
    let runner = Arc::new(RecordingRunner::new().with_tools(&["sh"]));
    let session = BuildSession::new(
        Arc::new(WidgetRecipe::default()),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner.clone(),
    )
    .unwrap();

    let err = session.create(&fx.fetcher).await.unwrap_err();
    assert!(matches!(err, Error::Build(BuildError::MissingTool { ref tool }) if tool == "make"));
    assert!(runner.commands().is_empty());
    assert!(!session.layout().source_dir().exists());
}

#[tokio::test]
async fn test_metadata_is_recomputed_identically() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let resolved = resolved(&recipe, &fx.table, &[("shared", "True")]);
    let runner = Arc::new(installing_runner(staging_for(&fx.settings, &resolved)));
    let session = BuildSession::new(
        Arc::new(WidgetRecipe::default()),
        resolved,
        fx.table.clone(),
        &fx.settings,
        runner,
    )
    .unwrap();
    let outcome = session.create(&fx.fetcher).await.unwrap();

    assert!(outcome.path.join("lib/libwidget.so").exists());
    assert!(!outcome.path.join("lib/libwidget.a").exists());

    let first = session.metadata(&outcome.path);
    let second = session.metadata(&outcome.path);
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    let published = ConsumptionMetadata::read_from(&outcome.path).await.unwrap();
    assert_eq!(published, outcome.metadata);
}

#[test]
fn test_configuration_errors_come_before_side_effects() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let version = UpstreamVersion::parse("1.0").unwrap();

    let unknown = Overrides::from([("with_gtk".to_string(), "True".to_string())]);
    let err = resolve(&recipe, &fx.table, &version, &linux(), &unknown).unwrap_err();
    assert!(err.is_configuration());

    let freebsd = Platform::new(Os::Freebsd, Arch::X86_64);
    let err = resolve(&recipe, &fx.table, &version, &freebsd, &Overrides::new()).unwrap_err();
    assert!(err.is_configuration());

    let err = resolve(
        &recipe,
        &fx.table,
        &UpstreamVersion::parse("2.0").unwrap(),
        &linux(),
        &Overrides::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Source(_)));
    assert!(!fx.settings.work_root.exists());
}

#[test]
fn test_windows_variant_drops_fpic() {
    let fx = fixture();
    let recipe = WidgetRecipe::default();
    let windows = Platform::new(Os::Windows, Arch::X86_64);
    let resolved = resolve(
        &recipe,
        &fx.table,
        &UpstreamVersion::parse("1.0").unwrap(),
        &windows,
        &Overrides::new(),
    )
    .unwrap();
    assert_eq!(resolved.variant, "windows");
    assert!(!resolved.options.has("fPIC"));
}
