//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use crucible_builder::{
    BuildConfiguration, ConsumptionMetadata, EffectiveSchema, PackageOutcome, ResolvedRecipe,
};
use crucible_recipes::DependencyGraph;
use crucible_types::Platform;
use serde::Serialize;
use std::io;

/// Built-in recipe as listed by `crucible list`
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub name: &'static str,
    pub description: &'static str,
    pub license: &'static str,
    pub homepage: &'static str,
    pub versions: Vec<String>,
}

/// Option table of a recipe on one platform
#[derive(Debug, Clone, Serialize)]
pub struct OptionsReport {
    pub recipe: String,
    pub platform: Platform,
    pub schema: EffectiveSchema,
}

/// Result of one command
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    RecipeList(Vec<RecipeSummary>),
    Options(OptionsReport),
    Resolved(Box<ResolvedRecipe>),
    Graph(DependencyGraph),
    Configuration(BuildConfiguration),
    Package(Box<PackageOutcome>),
    Metadata(Box<ConsumptionMetadata>),
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render a command result
    pub fn render(&self, report: &Report) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match report {
            Report::RecipeList(recipes) => render_recipe_list(recipes),
            Report::Options(options) => render_options(options),
            Report::Resolved(resolved) => render_resolved(resolved),
            Report::Graph(graph) => render_graph(graph),
            Report::Configuration(config) => render_configuration(config),
            Report::Package(outcome) => {
                println!(
                    "{} {}",
                    style("Packaged").green().bold(),
                    outcome.path.display()
                );
                println!("{} files", outcome.artifacts.files.len());
                println!();
                render_metadata(&outcome.metadata);
            }
            Report::Metadata(metadata) => render_metadata(metadata),
        }
        Ok(())
    }
}

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn render_recipe_list(recipes: &[RecipeSummary]) {
    let mut table = table(&["Recipe", "Versions", "License", "Description"]);
    for recipe in recipes {
        table.add_row(vec![
            Cell::new(recipe.name).fg(Color::Cyan),
            Cell::new(recipe.versions.join(", ")),
            Cell::new(recipe.license),
            Cell::new(recipe.description),
        ]);
    }
    println!("{table}");
}

fn render_options(report: &OptionsReport) {
    println!(
        "{} on {} {} ({}, variant {})",
        style(&report.recipe).bold(),
        report.platform.os,
        report.platform.arch,
        report.platform.compiler,
        report.schema.variant
    );
    let mut table = table(&["Option", "Default", "Values", "Description"]);
    for decl in &report.schema.options {
        table.add_row(vec![
            Cell::new(decl.name),
            Cell::new(decl.default.to_string()),
            Cell::new(decl.domain.to_string()),
            Cell::new(decl.help),
        ]);
    }
    println!("{table}");
}

fn render_resolved(resolved: &ResolvedRecipe) {
    println!(
        "{}/{} {}",
        style(&resolved.name).bold(),
        resolved.version,
        style(&resolved.package_id).dim()
    );
    println!("Build system: {}", resolved.build_system);
    println!("Variant:      {}", resolved.variant);
    println!("Source:       {}", resolved.source.url);
    if !resolved.patches.is_empty() {
        println!("Patches:      {}", resolved.patches.len());
    }

    println!();
    let mut options = table(&["Option", "Value"]);
    for (name, value) in resolved.options.iter() {
        options.add_row(vec![Cell::new(name), Cell::new(value.to_string())]);
    }
    println!("{options}");

    if !resolved.dependencies.is_empty() {
        println!();
        println!("Dependencies:");
        for edge in &resolved.dependencies {
            let coercions = format_pairs(edge.coercions.iter());
            if coercions.is_empty() {
                println!("  • {}", edge.reference);
            } else {
                println!("  • {} ({coercions})", edge.reference);
            }
        }
    }

    if !resolved.build_requirements.is_empty() {
        println!();
        println!("Build requirements:");
        for requirement in &resolved.build_requirements {
            println!("  • {requirement}");
        }
    }
}

fn render_graph(graph: &DependencyGraph) {
    let mut table = table(&["Package", "Kind", "Required by", "Forced options"]);
    for node in &graph.nodes {
        let kind = if node.is_builtin() {
            Cell::new("recipe").fg(Color::Green)
        } else {
            Cell::new("external").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(node.reference.to_string()),
            kind,
            Cell::new(node.required_by.join(", ")),
            Cell::new(format_pairs(node.overrides.iter())),
        ]);
    }
    println!("{table}");

    let order: Vec<String> = graph
        .build_order()
        .iter()
        .map(|n| n.reference.to_string())
        .collect();
    println!("Build order: {}", order.join(" → "));
}

fn render_configuration(config: &BuildConfiguration) {
    println!("{} {}", style("Build system:").bold(), config.system);
    for arg in &config.args {
        println!("  {arg}");
    }
    if !config.cflags.is_empty() {
        println!("CFLAGS:  {}", config.cflags.join(" "));
    }
    if !config.ldflags.is_empty() {
        println!("LDFLAGS: {}", config.ldflags.join(" "));
    }
    for (name, value) in &config.env {
        println!("{name}={value}");
    }
}

fn render_metadata(metadata: &ConsumptionMetadata) {
    println!(
        "{}/{} {}",
        style(&metadata.name).bold(),
        metadata.version,
        style(&metadata.package_id).dim()
    );
    for (generator, name) in &metadata.names {
        println!("Name ({generator}): {name}");
    }

    let rows = [
        ("Libraries", metadata.libs.join(", ")),
        ("System libraries", metadata.system_libs.join(", ")),
        ("Defines", metadata.defines.join(", ")),
        ("Build modules", metadata.build_modules.join(", ")),
        ("Requires", metadata.requires.join(", ")),
        ("Environment", format_pairs(metadata.env.iter())),
    ];
    for (label, value) in rows.iter().filter(|(_, v)| !v.is_empty()) {
        println!("{label}: {value}");
    }

    if !metadata.components.is_empty() {
        println!();
        let mut table = table(&["Component", "Libraries", "System libraries", "Requires"]);
        for (name, component) in &metadata.components {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(component.libs.join(", ")),
                Cell::new(component.system_libs.join(", ")),
                Cell::new(component.requires.join(", ")),
            ]);
        }
        println!("{table}");
    }
}

fn format_pairs<'a>(pairs: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    pairs
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
