//! Shared fixtures: a small autotools recipe and archive helpers

use crucible_builder::*;
use crucible_config::SourceTable;
use crucible_errors::ConfigError;
use crucible_types::{Os, Platform};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct WidgetRecipe {
    pub substitutions: Vec<TextSubstitution>,
    pub expected: Vec<&'static str>,
}

impl Default for WidgetRecipe {
    fn default() -> Self {
        Self {
            substitutions: vec![TextSubstitution::new("configure", "-lz ", "-lzlib ")],
            expected: vec!["include/widget.h", "lib/libwidget.*"],
        }
    }
}

impl Recipe for WidgetRecipe {
    fn name(&self) -> &'static str {
        "widget"
    }

    fn description(&self) -> &'static str {
        "Test widget library"
    }

    fn homepage(&self) -> &'static str {
        "https://example.com/widget"
    }

    fn license(&self) -> &'static str {
        "MIT"
    }

    fn source_table(&self) -> &'static str {
        ""
    }

    fn options(&self) -> OptionSchema {
        OptionSchema::new(vec![
            OptionDecl::boolean("shared", false, "Build shared libraries"),
            OptionDecl::boolean("fPIC", true, "Position independent code"),
            OptionDecl::boolean("with_zlib", true, "Compression support"),
            OptionDecl::boolean("with_extras", false, "Extra tools"),
        ])
        .with_variant(SchemaVariant::new("windows", |p| p.os == Os::Windows).removing(&["fPIC"]))
    }

    fn validate(&self, platform: &Platform, _options: &ResolvedOptions) -> Result<(), ConfigError> {
        if platform.os == Os::Freebsd {
            return Err(ConfigError::UnsupportedConfiguration {
                recipe: "widget".into(),
                reason: "FreeBSD is not supported".into(),
            });
        }
        Ok(())
    }

    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::when_option("with_zlib", "zlib/1.2.11"),
            Requirement::when_option("with_extras", "lz4/1.9.2"),
        ]
    }

    fn build_system(&self, _platform: &Platform) -> BuildSystemKind {
        BuildSystemKind::Autotools
    }

    fn arg_rules(&self, _system: BuildSystemKind) -> Vec<ArgRule> {
        vec![
            ArgRule::fixed(|_| vec![ArgFragment::arg("--without-readline")]),
            ArgRule::with_without("with_zlib", "zlib"),
            ArgRule::disable_when_off("with_extras", "extras"),
        ]
    }

    fn substitutions(&self, _ctx: &RecipeContext<'_>) -> Vec<TextSubstitution> {
        self.substitutions.clone()
    }

    fn package_plan(&self, _ctx: &RecipeContext<'_>) -> PackagePlan {
        let mut plan = PackagePlan::default()
            .copy(CopyRule::new("LICENSE", SOURCE_SUBFOLDER, "licenses"))
            .remove("share");
        for pattern in &self.expected {
            plan = plan.expect(pattern);
        }
        plan
    }

    fn package_info(&self, ctx: &RecipeContext<'_>, metadata: &mut ConsumptionMetadata) {
        metadata.set_cmake_name("Widget");
        if ctx.platform.os == Os::Linux {
            metadata.system_libs.push("pthread".into());
        }
    }
}

/// Write a `.tar.gz` whose entries are `(path, contents)`
pub fn write_tar_gz(dest: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(dest).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Widget source archive in the download cache plus its source table
pub fn cached_widget_source(cache_dir: &Path, top_level: &str) -> SourceTable {
    let dir = cache_dir.join("widget");
    std::fs::create_dir_all(&dir).unwrap();
    let archive = dir.join("widget-1.0.tar.gz");
    write_tar_gz(
        &archive,
        &[
            (&format!("{top_level}/configure"), "#!/bin/sh\nLIBS=\"-lz -lm\"\n"),
            (&format!("{top_level}/LICENSE"), "MIT\n"),
            (&format!("{top_level}/src/widget.c"), "int widget(void) { return 1; }\n"),
        ],
    );
    let sha = sha256_hex(&std::fs::read(&archive).unwrap());
    SourceTable::from_toml(
        "widget",
        &format!(
            "[sources.\"1.0\"]\nurl = \"https://example.com/widget-1.0.tar.gz\"\nsha256 = \"{sha}\"\n"
        ),
    )
    .unwrap()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}

/// Runner that simulates `make install` by writing a typical install tree
pub fn installing_runner(staging: PathBuf) -> RecordingRunner {
    RecordingRunner::with_handler(move |cmd| {
        if cmd.program == "make" && cmd.args.iter().any(|a| a == "install") {
            for (rel, contents) in [
                ("include/widget.h", "int widget(void);\n"),
                ("lib/libwidget.a", "!<arch>\n"),
                ("lib/libwidget.so", "ELF"),
                ("lib/libwidget.so.1", "ELF"),
                ("lib/libwidget.la", "# libtool\n"),
                ("lib/pkgconfig/widget.pc", "Name: widget\n"),
                ("share/doc/widget/README", "docs\n"),
            ] {
                let path = staging.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, contents).unwrap();
            }
        }
        CommandOutput::ok()
    })
}
