//! Source tree normalization

use super::support::write_tar_gz;
use crucible_builder::{extract_source, WorkLayout};
use proptest::prelude::*;

fn extract(entries: &[(&str, &str)]) -> (tempfile::TempDir, WorkLayout) {
    let work = tempfile::tempdir().unwrap();
    let archive = work.path().join("src.tar.gz");
    write_tar_gz(&archive, entries);
    let layout = WorkLayout::new(work.path(), "x", "1.0", "id");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(extract_source(&archive, &layout)).unwrap();
    (work, layout)
}

#[test]
fn test_flat_archive_is_used_as_is() {
    let (_work, layout) = extract(&[("configure", "x"), ("src/a.c", "y")]);
    assert!(layout.source_path("configure").is_file());
    assert!(layout.source_path("src/a.c").is_file());
}

#[test]
fn test_reextraction_replaces_previous_tree() {
    let work = tempfile::tempdir().unwrap();
    let layout = WorkLayout::new(work.path(), "x", "1.0", "id");
    let first = work.path().join("first.tar.gz");
    let second = work.path().join("second.tar.gz");
    write_tar_gz(&first, &[("x-1.0/stale.txt", "old")]);
    write_tar_gz(&second, &[("x-1.0/fresh.txt", "new")]);

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(extract_source(&first, &layout)).unwrap();
    rt.block_on(extract_source(&second, &layout)).unwrap();

    assert!(layout.source_path("fresh.txt").is_file());
    assert!(!layout.source_path("stale.txt").exists());
}

#[test]
fn test_zip_archive_is_normalized() {
    use std::io::Write;

    let work = tempfile::tempdir().unwrap();
    let archive = work.path().join("src.zip");
    {
        let file = std::fs::File::create(&archive).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory("soci-4.0.0/", options).unwrap();
        zip.start_file("soci-4.0.0/CMakeLists.txt", options).unwrap();
        zip.write_all(b"project(SOCI)\n").unwrap();
        zip.finish().unwrap();
    }
    let layout = WorkLayout::new(work.path(), "soci", "4.0.0", "id");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(extract_source(&archive, &layout)).unwrap();
    assert!(layout.source_path("CMakeLists.txt").is_file());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_any_top_level_name_lands_in_source_subfolder(top in "[a-zA-Z][a-zA-Z0-9._-]{0,24}") {
        let configure = format!("{top}/configure");
        let header = format!("{top}/include/lib.h");
        let (_work, layout) = extract(&[(configure.as_str(), "#!/bin/sh\n"), (header.as_str(), "")]);

        prop_assert!(layout.source_path("configure").is_file());
        prop_assert!(layout.source_path("include/lib.h").is_file());
        prop_assert!(layout.source_dir().ends_with("source_subfolder"));
    }
}
