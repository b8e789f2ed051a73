use crate::prelude::{println, *};
use colored::Colorize;
use folio_core::ids::{BlockId, DocumentId};
use folio_core::{BlockStore, Document};
use std::path::{Path, PathBuf};

use crate::store::{load_document, save_document};

#[derive(Debug, clap::Parser)]
#[command(name = "doc")]
#[command(about = "Edit a block document and inspect its AI provenance")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Create an empty document file
    New {
        /// Path to the document JSON file
        path: PathBuf,
        /// Document title
        #[arg(short, long, default_value = "")]
        title: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Add a block
    Add {
        /// Path to the document JSON file
        path: PathBuf,
        /// Block type: paragraph, heading, image, table, list, title, or any other tag
        kind: String,
        /// Block content
        content: String,
        /// Block to insert after; omit to append
        #[arg(short, long)]
        after: Option<String>,
        /// The content was produced by the AI assistant
        #[arg(long)]
        ai: bool,
    },
    /// Replace a block's content
    Edit {
        /// Path to the document JSON file
        path: PathBuf,
        /// Block id
        block: String,
        /// New content
        content: String,
        /// The new content was produced by the AI assistant
        #[arg(long)]
        ai: bool,
    },
    /// Delete a block
    Delete {
        /// Path to the document JSON file
        path: PathBuf,
        /// Block id
        block: String,
    },
    /// Reorder blocks; every block id must be listed exactly once
    Reorder {
        /// Path to the document JSON file
        path: PathBuf,
        /// Block ids in their new order
        #[arg(required = true)]
        blocks: Vec<String>,
    },
    /// List blocks with their AI provenance
    Provenance {
        /// Path to the document JSON file
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvenanceOutput<'a> {
    document: &'a DocumentId,
    ai_assisted: Vec<&'a BlockId>,
    total_blocks: usize,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let config = global.load_config()?;

    match app.command {
        Commands::New { path, title, force } => {
            if path.exists() && !force {
                return Err(eyre!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ));
            }
            let mut store = BlockStore::new();
            let document = store.create_document(title);
            save_document(&path, document)?;
            println!(
                "{} {} ({})",
                "Created document".green().bold(),
                path.display(),
                document.id()
            );
            Ok(())
        }
        Commands::Add {
            path,
            kind,
            content,
            after,
            ai,
        } => edit(&path, global.verbose, |store, doc| {
            let after = after.map(BlockId::new);
            let block = store.insert_block(doc, after.as_ref(), kind, content, ai)?;
            Ok(f!("Added {} block {}", block.kind, block.id))
        }),
        Commands::Edit {
            path,
            block,
            content,
            ai,
        } => edit(&path, global.verbose, |store, _| {
            let block = store.edit_block(&BlockId::new(block), content, ai)?;
            let origin = if block.ai_assisted { "AI-assisted" } else { "human" };
            Ok(f!("Updated block {} ({})", block.id, origin))
        }),
        Commands::Delete { path, block } => edit(&path, global.verbose, |store, _| {
            let removed = store.delete_block(&BlockId::new(block))?;
            Ok(f!("Deleted {} block {}", removed.kind, removed.id))
        }),
        Commands::Reorder { path, blocks } => edit(&path, global.verbose, |store, doc| {
            let order: Vec<BlockId> = blocks.into_iter().map(BlockId::new).collect();
            store.reorder_blocks(doc, &order)?;
            Ok(f!("Reordered {} block(s)", order.len()))
        }),
        Commands::Provenance { path, json } => {
            let document = load_document(&path)?;
            if config.wants_json(json) {
                let output = ProvenanceOutput {
                    document: document.id(),
                    ai_assisted: document.ai_assisted_blocks(),
                    total_blocks: document.blocks().len(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_blocks(&document);
            }
            Ok(())
        }
    }
}

/// Load the document at `path` into a store, apply `change`, and save it back on success.
fn edit(
    path: &Path,
    verbose: bool,
    change: impl FnOnce(&mut BlockStore, &DocumentId) -> Result<String>,
) -> Result<()> {
    let mut store = BlockStore::new();
    let id = store.open(load_document(path)?)?.id().clone();

    let message = change(&mut store, &id)?;

    let document = store
        .document(&id)
        .ok_or_else(|| eyre!("Document {} is no longer open", id))?;
    save_document(path, document)?;

    println!("{}", message.green());
    if verbose {
        print_blocks(document);
    }
    Ok(())
}

fn preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_chars && !content.contains('\n') {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        f!("{}...", cut)
    }
}

fn print_blocks(document: &Document) {
    if !document.title().is_empty() {
        println!("{}", document.title().bright_cyan().bold());
    }
    if document.blocks().is_empty() {
        println!("{}", "No blocks.".yellow());
        return;
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "#".bold().cyan(),
        "Id".bold().cyan(),
        "Type".bold().cyan(),
        "Origin".bold().cyan(),
        "Content".bold().cyan()
    ]);
    for (index, block) in document.blocks().iter().enumerate() {
        let origin = if block.ai_assisted {
            "AI".bright_magenta()
        } else {
            "human".green()
        };
        table.add_row(prettytable::row![
            (index + 1).to_string().bright_black(),
            block.id.as_str().bright_white(),
            block.kind.as_str().bright_yellow(),
            origin,
            preview(&block.content, 48)
        ]);
    }
    table.printstd();

    let ai = document.ai_assisted_blocks().len();
    println!(
        "\n{} of {} block(s) AI-assisted",
        ai.to_string().bright_magenta().bold(),
        document.blocks().len()
    );
}
