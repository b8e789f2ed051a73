use crate::prelude::{println, *};
use colored::Colorize;
use folio_core::ids::SectionId;
use folio_core::numbering::renumber;
use folio_core::{Parent, SectionTree};
use std::path::{Path, PathBuf};

use crate::store::{load_report, save_report};

#[derive(Debug, clap::Parser)]
#[command(name = "report")]
#[command(about = "Edit the numbered section tree of a report")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Create an empty report file
    New {
        /// Path to the report JSON file
        path: PathBuf,
        /// Report title
        #[arg(short, long, default_value = "")]
        title: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the table of contents
    Toc {
        /// Path to the report JSON file
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a section, or a subsection with --parent
    Add {
        /// Path to the report JSON file
        path: PathBuf,
        /// Section title
        title: String,
        /// Section body text
        #[arg(short, long, default_value = "")]
        content: String,
        /// Parent section (id or number); omit for a top-level section
        #[arg(short, long)]
        parent: Option<String>,
        /// Sibling to insert after (id or number); omit to append
        #[arg(short, long)]
        after: Option<String>,
    },
    /// Move a section to a new parent and position
    Move {
        /// Path to the report JSON file
        path: PathBuf,
        /// Section to move (id or number)
        section: String,
        /// New parent section (id or number); omit for top level
        #[arg(short, long)]
        parent: Option<String>,
        /// Position among the new siblings (0-based); omit to append
        #[arg(short, long)]
        index: Option<usize>,
    },
    /// Delete a section and its subsections
    Delete {
        /// Path to the report JSON file
        path: PathBuf,
        /// Section to delete (id or number)
        section: String,
    },
    /// Change a section's title or body text
    Edit {
        /// Path to the report JSON file
        path: PathBuf,
        /// Section to edit (id or number)
        section: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Pin a custom number on a section (e.g. "A" or "A.1")
    Lock {
        /// Path to the report JSON file
        path: PathBuf,
        /// Section to lock (id or number)
        section: String,
        /// Number to pin
        number: String,
    },
    /// Return a section to automatic numbering
    Unlock {
        /// Path to the report JSON file
        path: PathBuf,
        /// Section to unlock (id or number)
        section: String,
    },
    /// Recompute every automatic number and check for conflicts
    Renumber {
        /// Path to the report JSON file
        path: PathBuf,
    },
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
            save_report(&path, &SectionTree::new(title))?;
            println!("{} {}", "Created report".green().bold(), path.display());
            Ok(())
        }
        Commands::Toc { path, json } => {
            let tree = load_report(&path)?;
            if config.wants_json(json) {
                println!("{}", serde_json::to_string_pretty(&tree.outline())?);
            } else {
                print_toc(&tree);
            }
            Ok(())
        }
        Commands::Add {
            path,
            title,
            content,
            parent,
            after,
        } => edit(&path, global.verbose, |tree| {
            let parent = parent_ref(tree, parent.as_deref())?;
            let after = after.as_deref().map(|a| section_ref(tree, a)).transpose()?;
            let node = tree.insert_section(&parent, after.as_ref(), title, content)?;
            Ok(f!("Added {} {} ({})", node.number(), node.title(), node.id()))
        }),
        Commands::Move {
            path,
            section,
            parent,
            index,
        } => edit(&path, global.verbose, |tree| {
            let id = section_ref(tree, &section)?;
            let parent = parent_ref(tree, parent.as_deref())?;
            let index = match index {
                Some(index) => index,
                None => tree
                    .list_children(&parent)?
                    .iter()
                    .filter(|child| child.id() != &id)
                    .count(),
            };
            tree.move_section(&id, &parent, index)?;
            let node = tree.get_section(&id).ok_or_eyre("moved section vanished")?;
            Ok(f!("Moved {} to {}", node.title(), node.number()))
        }),
        Commands::Delete { path, section } => edit(&path, global.verbose, |tree| {
            let id = section_ref(tree, &section)?;
            tree.delete_section(&id)?;
            Ok(f!("Deleted {}", id))
        }),
        Commands::Edit {
            path,
            section,
            title,
            content,
        } => edit(&path, global.verbose, |tree| {
            if title.is_none() && content.is_none() {
                return Err(eyre!("Nothing to edit: pass --title and/or --content"));
            }
            let id = section_ref(tree, &section)?;
            tree.update_section(&id, title, content)?;
            Ok(f!("Updated {}", id))
        }),
        Commands::Lock {
            path,
            section,
            number,
        } => edit(&path, global.verbose, |tree| {
            let id = section_ref(tree, &section)?;
            tree.lock_number(&id, number.as_str())?;
            Ok(f!("Locked {} as {}", id, number))
        }),
        Commands::Unlock { path, section } => edit(&path, global.verbose, |tree| {
            let id = section_ref(tree, &section)?;
            tree.unlock_number(&id)?;
            let node = tree.get_section(&id).ok_or_eyre("unlocked section vanished")?;
            Ok(f!("Unlocked {}, now numbered {}", id, node.number()))
        }),
        Commands::Renumber { path } => edit(&path, global.verbose, |tree| {
            *tree = renumber(tree)?;
            Ok(f!("Renumbered {} section(s)", tree.len()))
        }),
    }
}

/// Load the report at `path`, apply `change`, and save it back on success.
fn edit(
    path: &Path,
    verbose: bool,
    change: impl FnOnce(&mut SectionTree) -> Result<String>,
) -> Result<()> {
    let mut tree = load_report(path)?;
    let message = change(&mut tree)?;
    save_report(path, &tree)?;

    println!("{}", message.green());
    if verbose {
        print_toc(&tree);
    }
    Ok(())
}

/// Resolve a section reference given either as an id or as a current number.
fn section_ref(tree: &SectionTree, reference: &str) -> Result<SectionId> {
    let id = SectionId::from(reference);
    if tree.get_section(&id).is_some() {
        return Ok(id);
    }
    tree.find_by_number(reference)
        .map(|node| node.id().clone())
        .ok_or_else(|| eyre!("No section with id or number {}", reference))
}

fn parent_ref(tree: &SectionTree, reference: Option<&str>) -> Result<Parent> {
    match reference {
        None => Ok(Parent::Root),
        Some(reference) => Ok(Parent::Section(section_ref(tree, reference)?)),
    }
}

fn print_toc(tree: &SectionTree) {
    if !tree.title().is_empty() {
        println!("{}", tree.title().bright_cyan().bold());
    }
    if tree.is_empty() {
        println!("{}", "No sections.".yellow());
        return;
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Number".bold().cyan(),
        "Title".bold().cyan(),
        "Id".bold().cyan()
    ]);
    for node in tree.nodes() {
        let indent = "  ".repeat(usize::from(node.depth().saturating_sub(1)));
        let number = if node.is_locked() {
            f!("{} *", node.number()).bright_yellow()
        } else {
            node.number().green()
        };
        table.add_row(prettytable::row![
            number,
            f!("{}{}", indent, node.title()).bright_white(),
            node.id().as_str().bright_black()
        ]);
    }
    table.printstd();
}
