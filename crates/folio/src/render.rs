use crate::prelude::{eprintln, println, *};
use colored::Colorize;
use folio_core::numbering::renumber;
use folio_core::resolve::{LayoutSource, ResolvedLayout};
use folio_core::{paginate_with, resolve, resolve_document, DocumentTemplate, PaginationOptions, ReportPage};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{load_source, load_template, Source};

#[derive(Debug, clap::Args, Clone)]
pub struct RenderOptions {
    /// Report or document JSON files to render
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Template file (.json or .toml); defaults to default_template from folio.toml
    #[arg(short, long, env = "FOLIO_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Let heading blocks end a page without their following text block
    #[arg(long)]
    pub no_keep_with_next: bool,

    /// Show every placed element, not just the page summary
    #[arg(short, long)]
    pub elements: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One rendered input file.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedFile {
    pub path: PathBuf,
    pub source: LayoutSource,
    pub snapshot: String,
    /// The stored section numbers were stale and were re-derived before rendering.
    pub renumbered: bool,
    pub pages: Vec<ReportPage>,
}

impl RenderedFile {
    fn overflowing(&self) -> usize {
        self.pages.iter().filter(|p| p.overflow).count()
    }
}

pub async fn run(options: RenderOptions, global: crate::Global) -> Result<()> {
    let config = global.load_config()?;

    let template_path = options
        .template
        .clone()
        .or_else(|| config.default_template.clone())
        .ok_or(Error::NoTemplate)?;
    let template = Arc::new(load_template(&template_path)?);

    let mut pagination = config.pagination_options();
    if options.no_keep_with_next {
        pagination.heading_keep_with_next = false;
    }

    if global.verbose {
        println!(
            "Template: {} ({}) from {}",
            template.name(),
            template.id(),
            template_path.display()
        );
        println!("Rendering {} file(s)...", options.files.len());
        println!();
    }

    let rendered = render_files(options.files.clone(), template, pagination).await?;

    for file in rendered.iter().filter(|file| file.renumbered) {
        eprintln!(
            "{} {} has stale section numbers; rendered with fresh ones (run `folio report renumber` to save them)",
            "Warning:".yellow().bold(),
            file.path.display()
        );
    }

    if config.wants_json(options.json) {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        for file in &rendered {
            print_file(file, options.elements);
        }
    }

    Ok(())
}

/// Render every file on the blocking pool. Each file is independent, so they
/// run concurrently; results come back in input order.
pub async fn render_files(
    files: Vec<PathBuf>,
    template: Arc<DocumentTemplate>,
    pagination: PaginationOptions,
) -> Result<Vec<RenderedFile>> {
    let tasks = files.into_iter().map(|path| {
        let template = Arc::clone(&template);
        tokio::task::spawn_blocking(move || render_file(path, &template, pagination))
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.map_err(|e| eyre!("Render task failed: {}", e))?)
        .collect()
}

/// Load, resolve, and paginate a single file. Reports are renumbered first so
/// pages never show numbers that were hand-edited out of sequence.
pub fn render_file(
    path: PathBuf,
    template: &DocumentTemplate,
    pagination: PaginationOptions,
) -> Result<RenderedFile> {
    let mut renumbered = false;
    let layout: ResolvedLayout = match load_source(&path)? {
        Source::Report(stored) => {
            let tree = renumber(&stored)
                .with_context(|| f!("Failed to renumber {}", path.display()))?;
            renumbered = tree != stored;
            if renumbered {
                log::warn!("{}: stored section numbers are stale", path.display());
            }
            resolve(template, &tree)
        }
        Source::Document(document) => resolve_document(template, &document),
    }
    .with_context(|| f!("Failed to resolve {}", path.display()))?;

    let pages: Vec<ReportPage> = paginate_with(&layout, &template.geometry(), pagination).collect();
    log::debug!("{}: {} page(s)", path.display(), pages.len());

    Ok(RenderedFile {
        path,
        source: layout.source,
        snapshot: layout.snapshot,
        renumbered,
        pages,
    })
}

fn print_file(file: &RenderedFile, show_elements: bool) {
    println!("\n{}", "=".repeat(80).bright_cyan());
    println!(
        "{} ({} page(s))",
        file.path.display().to_string().bright_cyan().bold(),
        file.pages.len()
    );
    println!("{}", "=".repeat(80).bright_cyan());

    if file.pages.is_empty() {
        println!("{}", "Nothing to render.".yellow());
        return;
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Page".bold().cyan(),
        "Elements".bold().cyan(),
        "Used".bold().cyan(),
        "First".bold().cyan(),
        "Notes".bold().cyan()
    ]);
    for page in &file.pages {
        let first = page
            .content
            .elements
            .first()
            .map(|placed| placed.element.label())
            .unwrap_or_default();
        let notes = if page.overflow {
            "overflow".red().bold()
        } else {
            "".normal()
        };
        table.add_row(prettytable::row![
            page.page_number.to_string().green(),
            page.content.elements.len().to_string().bright_white(),
            f!("{:.0}/{:.0}pt", page.used_height, page.capacity).bright_black(),
            first,
            notes
        ]);
    }
    table.printstd();

    if show_elements {
        for page in &file.pages {
            println!("\n{}", f!("Page {}", page.page_number).bright_yellow().bold());
            for placed in &page.content.elements {
                let marker = if placed.element.is_ai_assisted() {
                    " [AI]".bright_magenta()
                } else {
                    "".normal()
                };
                println!(
                    "  {:>7.1}pt  {:<8} {}{}",
                    placed.offset,
                    placed.element.kind.as_str(),
                    placed.element.label(),
                    marker
                );
            }
        }
    }

    let overflowing = file.overflowing();
    if overflowing > 0 {
        println!(
            "\n{} {} page(s) hold a section or block taller than the page",
            "Warning:".yellow().bold(),
            overflowing
        );
    }
}
