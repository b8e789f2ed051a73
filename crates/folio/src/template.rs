use crate::prelude::{println, *};
use colored::Colorize;
use folio_core::template::PageSize;
use folio_core::{DocumentTemplate, PageGeometry};
use std::path::PathBuf;

use crate::store::load_template;

#[derive(Debug, clap::Parser)]
#[command(name = "template")]
#[command(about = "Inspect page templates")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Print a template's rules and derived page geometry
    Show {
        /// Template file (.json or .toml)
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOutput<'a> {
    template: &'a DocumentTemplate,
    geometry: PageGeometry,
    content_width: f64,
    capacity: f64,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = global.load_config()?;

    match app.command {
        Commands::Show { path, json } => {
            let template = load_template(&path)?;
            let geometry = template.geometry();
            if config.wants_json(json) {
                let output = ShowOutput {
                    template: &template,
                    geometry,
                    content_width: geometry.content_width(),
                    capacity: geometry.capacity(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_template(&template, &geometry);
            }
            Ok(())
        }
    }
}

fn page_size_label(size: &PageSize) -> String {
    match size {
        PageSize::Named(paper) => f!("{:?}", paper),
        PageSize::Custom { width, height } => f!("Custom {}x{}pt", width, height),
    }
}

fn print_template(template: &DocumentTemplate, geometry: &PageGeometry) {
    let settings = template.settings();
    println!(
        "{} {}",
        template.name().bright_cyan().bold(),
        f!("({})", template.id()).bright_black()
    );
    if let Some(description) = &settings.description {
        println!("{}", description);
    }
    println!();

    let mut table = new_table();
    let rows = [
        ("Page size", page_size_label(&settings.page_size)),
        ("Orientation", f!("{:?}", settings.orientation)),
        ("Page", f!("{:.2} x {:.2}pt", geometry.width, geometry.height)),
        (
            "Margins",
            f!(
                "{} / {} / {} / {}pt",
                geometry.margins.top,
                geometry.margins.right,
                geometry.margins.bottom,
                geometry.margins.left
            ),
        ),
        (
            "Bands",
            f!(
                "header {}pt, footer {}pt",
                geometry.header_height,
                geometry.footer_height
            ),
        ),
        ("Content width", f!("{:.2}pt", geometry.content_width())),
        ("Capacity", f!("{:.2}pt", geometry.capacity())),
    ];
    for (label, value) in rows {
        table.add_row(prettytable::row![label.green(), value.bright_white()]);
    }
    table.printstd();

    println!("\n{}", "Rules".bright_yellow().bold());
    if template.rules().is_empty() {
        println!("{}", "No rules: this template cannot render anything.".red());
        return;
    }
    let mut rules = new_table();
    rules.add_row(prettytable::row![
        "#".bold().cyan(),
        "Type".bold().cyan(),
        "Properties".bold().cyan(),
        "Styles".bold().cyan()
    ]);
    for (index, rule) in template.rules().iter().enumerate() {
        let shadowed = template
            .rule_for(rule.kind)
            .is_some_and(|(first, _)| first != index);
        let kind = if shadowed {
            f!("{} (unused)", rule.kind).bright_black()
        } else {
            rule.kind.as_str().bright_yellow()
        };
        let properties = rule
            .properties
            .iter()
            .map(|(k, v)| f!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        let styles = rule
            .styles
            .iter()
            .map(|(k, v)| f!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        rules.add_row(prettytable::row![index, kind, properties, styles]);
    }
    rules.printstd();
}
