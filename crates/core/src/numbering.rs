//! Numbering engine
//!
//! Derives the `number` of every section and subsection from its position:
//! top-level sections get `1`, `2`, ... and subsections get
//! `{sectionNumber}.{k}`. Locked nodes keep their author-chosen number and do
//! not consume a position in the sequence. After assignment every number in
//! the tree must be unique; a collision is reported, never repaired.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::error::{DocumentError, InvalidNumber};
use crate::sections::SectionTree;

static CUSTOM_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(\.[A-Za-z0-9]+)*$").expect("custom number pattern is valid")
});

/// Check that an author-supplied number is usable as a lock.
pub fn validate_custom_number(number: &str) -> Result<(), InvalidNumber> {
    if CUSTOM_NUMBER.is_match(number) {
        Ok(())
    } else {
        Err(InvalidNumber(number.to_string()))
    }
}

/// Return a copy of `tree` with every unlocked number re-derived.
///
/// Idempotent: renumbering an already renumbered tree yields an identical tree.
pub fn renumber(tree: &SectionTree) -> Result<SectionTree, DocumentError> {
    let mut next = tree.clone();
    renumber_in_place(&mut next)?;
    Ok(next)
}

fn renumber_in_place(tree: &mut SectionTree) -> Result<(), DocumentError> {
    let mut position = 0usize;
    for section in tree.sections_mut() {
        if !section.locked {
            position += 1;
            section.number = position.to_string();
        }
        let mut sub_position = 0usize;
        for sub in &mut section.subsections {
            if !sub.locked {
                sub_position += 1;
                sub.number = format!("{}.{}", section.number, sub_position);
            }
        }
    }
    check_unique(tree)?;
    debug!("renumbered {} node(s)", tree.len());
    Ok(())
}

/// Fail with the first number (in document order) claimed by more than one node.
fn check_unique(tree: &SectionTree) -> Result<(), DocumentError> {
    let mut claims: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();
    for node in tree.nodes() {
        let entry = claims.entry(node.number()).or_default();
        if entry.is_empty() {
            order.push(node.number());
        }
        entry.push(node.id().to_string());
    }

    for number in order {
        if let Some(nodes) = claims.get(number) {
            if nodes.len() > 1 {
                return Err(DocumentError::NumberConflict {
                    number: number.to_string(),
                    nodes: nodes.clone(),
                });
            }
        }
    }
    Ok(())
}
