//! Two-level report hierarchy (sections and subsections)
//!
//! Every structural mutation runs on a candidate copy of the tree, is
//! renumbered, and only replaces the live tree when renumbering succeeds.
//! A failed mutation therefore never leaves a half-applied edit behind.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::ids::SectionId;
use crate::numbering::{self, validate_custom_number};

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubsection {
    pub id: SectionId,
    pub number: String,
    /// When set, `number` was chosen by the author and renumbering leaves it alone.
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    pub id: SectionId,
    pub number: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<ReportSubsection>,
}

impl ReportSection {
    fn new(title: String, content: String) -> Self {
        ReportSection {
            id: SectionId::generate(),
            number: String::new(),
            locked: false,
            title,
            content,
            subsections: Vec::new(),
        }
    }

    fn into_subsection(self) -> ReportSubsection {
        ReportSubsection {
            id: self.id,
            number: self.number,
            locked: self.locked,
            title: self.title,
            content: self.content,
        }
    }
}

impl From<ReportSubsection> for ReportSection {
    fn from(sub: ReportSubsection) -> Self {
        ReportSection {
            id: sub.id,
            number: sub.number,
            locked: sub.locked,
            title: sub.title,
            content: sub.content,
            subsections: Vec::new(),
        }
    }
}

/// Where a node lives, or where a new one should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    Root,
    Section(SectionId),
}

/// Borrowed view of either kind of node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionNode<'a> {
    Section(&'a ReportSection),
    Subsection {
        parent: &'a ReportSection,
        node: &'a ReportSubsection,
    },
}

impl<'a> SectionNode<'a> {
    pub fn id(&self) -> &'a SectionId {
        match self {
            SectionNode::Section(s) => &s.id,
            SectionNode::Subsection { node, .. } => &node.id,
        }
    }

    pub fn number(&self) -> &'a str {
        match self {
            SectionNode::Section(s) => &s.number,
            SectionNode::Subsection { node, .. } => &node.number,
        }
    }

    pub fn title(&self) -> &'a str {
        match self {
            SectionNode::Section(s) => &s.title,
            SectionNode::Subsection { node, .. } => &node.title,
        }
    }

    pub fn content(&self) -> &'a str {
        match self {
            SectionNode::Section(s) => &s.content,
            SectionNode::Subsection { node, .. } => &node.content,
        }
    }

    pub fn is_locked(&self) -> bool {
        match self {
            SectionNode::Section(s) => s.locked,
            SectionNode::Subsection { node, .. } => node.locked,
        }
    }

    /// 1 for sections, 2 for subsections.
    pub fn depth(&self) -> u8 {
        match self {
            SectionNode::Section(_) => 1,
            SectionNode::Subsection { .. } => 2,
        }
    }

    pub fn parent(&self) -> Parent {
        match self {
            SectionNode::Section(_) => Parent::Root,
            SectionNode::Subsection { parent, .. } => Parent::Section(parent.id.clone()),
        }
    }
}

/// One line of a table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineEntry {
    pub id: SectionId,
    pub number: String,
    pub title: String,
    pub depth: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Section(usize),
    Subsection(usize, usize),
}

/// The report structure: an ordered list of sections, each with an ordered
/// list of subsections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TreeRepr")]
pub struct SectionTree {
    title: String,
    sections: Vec<ReportSection>,
}

#[derive(Deserialize)]
struct TreeRepr {
    #[serde(default)]
    title: String,
    #[serde(default)]
    sections: Vec<ReportSection>,
}

impl TryFrom<TreeRepr> for SectionTree {
    type Error = DocumentError;

    fn try_from(repr: TreeRepr) -> Result<Self, Self::Error> {
        SectionTree::from_parts(repr.title, repr.sections)
    }
}

impl SectionTree {
    pub fn new(title: impl Into<String>) -> Self {
        SectionTree {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    /// Assemble a tree from stored parts, rejecting duplicate ids.
    ///
    /// Numbers are kept exactly as stored; call [`numbering::renumber`] to repair them.
    pub fn from_parts(
        title: impl Into<String>,
        sections: Vec<ReportSection>,
    ) -> Result<Self, DocumentError> {
        let mut seen = HashSet::new();
        for section in &sections {
            let ids = std::iter::once(&section.id).chain(section.subsections.iter().map(|s| &s.id));
            for id in ids {
                if !seen.insert(id.clone()) {
                    return Err(DocumentError::validation(format!(
                        "duplicate section id {}",
                        id
                    )));
                }
            }
        }
        Ok(SectionTree {
            title: title.into(),
            sections,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub(crate) fn sections_mut(&mut self) -> &mut [ReportSection] {
        &mut self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of nodes, sections and subsections alike.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| 1 + s.subsections.len()).sum()
    }

    /// Every node in document order: a section, then its subsections.
    pub fn nodes(&self) -> impl Iterator<Item = SectionNode<'_>> {
        self.sections.iter().flat_map(|section| {
            std::iter::once(SectionNode::Section(section)).chain(
                section.subsections.iter().map(move |node| SectionNode::Subsection {
                    parent: section,
                    node,
                }),
            )
        })
    }

    fn locate(&self, id: &SectionId) -> Option<Location> {
        for (i, section) in self.sections.iter().enumerate() {
            if &section.id == id {
                return Some(Location::Section(i));
            }
            if let Some(j) = section.subsections.iter().position(|s| &s.id == id) {
                return Some(Location::Subsection(i, j));
            }
        }
        None
    }

    fn node_at(&self, location: Location) -> SectionNode<'_> {
        match location {
            Location::Section(i) => SectionNode::Section(&self.sections[i]),
            Location::Subsection(i, j) => SectionNode::Subsection {
                parent: &self.sections[i],
                node: &self.sections[i].subsections[j],
            },
        }
    }

    pub fn get_section(&self, id: &SectionId) -> Option<SectionNode<'_>> {
        self.locate(id).map(|loc| self.node_at(loc))
    }

    /// Look up a node by its current number.
    pub fn find_by_number(&self, number: &str) -> Option<SectionNode<'_>> {
        self.nodes().find(|n| n.number() == number)
    }

    /// Children of `parent` in order. Subsections are leaves and have none.
    pub fn list_children(&self, parent: &Parent) -> Result<Vec<SectionNode<'_>>, DocumentError> {
        match parent {
            Parent::Root => Ok(self.sections.iter().map(SectionNode::Section).collect()),
            Parent::Section(id) => match self.locate(id) {
                Some(Location::Section(i)) => {
                    let section = &self.sections[i];
                    Ok(section
                        .subsections
                        .iter()
                        .map(|node| SectionNode::Subsection {
                            parent: section,
                            node,
                        })
                        .collect())
                }
                Some(Location::Subsection(..)) => Ok(Vec::new()),
                None => Err(DocumentError::not_found("section", id)),
            },
        }
    }

    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.nodes()
            .map(|n| OutlineEntry {
                id: n.id().clone(),
                number: n.number().to_string(),
                title: n.title().to_string(),
                depth: n.depth(),
            })
            .collect()
    }

    /// Replace the live tree with a renumbered candidate, or leave it untouched.
    fn commit(&mut self, candidate: SectionTree) -> Result<(), DocumentError> {
        *self = numbering::renumber(&candidate)?;
        Ok(())
    }

    /// Insert a new node under `parent`, right after `after` or at the end.
    ///
    /// The returned node is already renumbered.
    pub fn insert_section(
        &mut self,
        parent: &Parent,
        after: Option<&SectionId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<SectionNode<'_>, DocumentError> {
        let fresh = ReportSection::new(title.into(), content.into());
        let id = fresh.id.clone();
        let mut candidate = self.clone();

        match parent {
            Parent::Root => {
                let index = insertion_index(&candidate.sections, after, |s| &s.id)?;
                candidate.sections.insert(index, fresh);
            }
            Parent::Section(parent_id) => {
                let i = match candidate.locate(parent_id) {
                    Some(Location::Section(i)) => i,
                    Some(Location::Subsection(..)) => {
                        return Err(DocumentError::invalid_move(format!(
                            "{} is a subsection and cannot contain children",
                            parent_id
                        )))
                    }
                    None => return Err(DocumentError::not_found("section", parent_id)),
                };
                let index = insertion_index(&candidate.sections[i].subsections, after, |s| &s.id)?;
                candidate.sections[i]
                    .subsections
                    .insert(index, fresh.into_subsection());
            }
        }

        self.commit(candidate)?;
        debug!("inserted section {} under {:?}", id, parent);
        self.get_section(&id)
            .ok_or_else(|| DocumentError::not_found("section", &id))
    }

    /// Move a node (with its subsections) under `new_parent` at `new_index`.
    ///
    /// `new_index` counts positions among the destination's children after the
    /// node has been detached, so `len` appends.
    pub fn move_section(
        &mut self,
        id: &SectionId,
        new_parent: &Parent,
        new_index: usize,
    ) -> Result<(), DocumentError> {
        let from = self
            .locate(id)
            .ok_or_else(|| DocumentError::not_found("section", id))?;

        let target = match new_parent {
            Parent::Root => None,
            Parent::Section(parent_id) => {
                if parent_id == id {
                    return Err(DocumentError::invalid_move(format!(
                        "{} cannot be moved under itself",
                        id
                    )));
                }
                match self.locate(parent_id) {
                    None => return Err(DocumentError::not_found("section", parent_id)),
                    Some(Location::Subsection(i, _)) => {
                        if from == Location::Section(i) {
                            return Err(DocumentError::invalid_move(format!(
                                "{} cannot be moved under its own subsection {}",
                                id, parent_id
                            )));
                        }
                        return Err(DocumentError::invalid_move(format!(
                            "{} is a subsection; nesting under it would exceed two levels",
                            parent_id
                        )));
                    }
                    Some(Location::Section(_)) => Some(parent_id),
                }
            }
        };

        if let (Location::Section(i), Some(_)) = (from, target) {
            if !self.sections[i].subsections.is_empty() {
                return Err(DocumentError::invalid_move(format!(
                    "{} has subsections; demoting it would exceed two levels",
                    id
                )));
            }
        }

        let mut candidate = self.clone();
        let detached: ReportSection = match from {
            Location::Section(i) => candidate.sections.remove(i),
            Location::Subsection(i, j) => candidate.sections[i].subsections.remove(j).into(),
        };

        match target {
            None => {
                if new_index > candidate.sections.len() {
                    return Err(index_out_of_range(new_index, candidate.sections.len()));
                }
                candidate.sections.insert(new_index, detached);
            }
            Some(parent_id) => {
                let i = match candidate.locate(parent_id) {
                    Some(Location::Section(i)) => i,
                    _ => return Err(DocumentError::not_found("section", parent_id)),
                };
                let siblings = &mut candidate.sections[i].subsections;
                if new_index > siblings.len() {
                    return Err(index_out_of_range(new_index, siblings.len()));
                }
                siblings.insert(new_index, detached.into_subsection());
            }
        }

        self.commit(candidate)?;
        debug!("moved section {} to {:?}[{}]", id, new_parent, new_index);
        Ok(())
    }

    /// Delete a node; a section takes its subsections with it.
    pub fn delete_section(&mut self, id: &SectionId) -> Result<(), DocumentError> {
        let location = self
            .locate(id)
            .ok_or_else(|| DocumentError::not_found("section", id))?;

        let mut candidate = self.clone();
        match location {
            Location::Section(i) => {
                let removed = candidate.sections.remove(i);
                debug!(
                    "deleted section {} and {} subsection(s)",
                    id,
                    removed.subsections.len()
                );
            }
            Location::Subsection(i, j) => {
                candidate.sections[i].subsections.remove(j);
                debug!("deleted subsection {}", id);
            }
        }
        self.commit(candidate)
    }

    /// Edit the text of a node. Structure and numbers are untouched.
    pub fn update_section(
        &mut self,
        id: &SectionId,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<(), DocumentError> {
        let location = self
            .locate(id)
            .ok_or_else(|| DocumentError::not_found("section", id))?;
        let (node_title, node_content) = match location {
            Location::Section(i) => {
                let s = &mut self.sections[i];
                (&mut s.title, &mut s.content)
            }
            Location::Subsection(i, j) => {
                let s = &mut self.sections[i].subsections[j];
                (&mut s.title, &mut s.content)
            }
        };
        if let Some(title) = title {
            *node_title = title;
        }
        if let Some(content) = content {
            *node_content = content;
        }
        Ok(())
    }

    /// Pin an author-chosen number on a node.
    pub fn lock_number(
        &mut self,
        id: &SectionId,
        number: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let number = number.into();
        validate_custom_number(&number)?;
        self.set_lock(id, Some(number))
    }

    /// Return a node to position-derived numbering.
    pub fn unlock_number(&mut self, id: &SectionId) -> Result<(), DocumentError> {
        self.set_lock(id, None)
    }

    fn set_lock(&mut self, id: &SectionId, number: Option<String>) -> Result<(), DocumentError> {
        let location = self
            .locate(id)
            .ok_or_else(|| DocumentError::not_found("section", id))?;
        let mut candidate = self.clone();
        let (node_number, node_locked) = match location {
            Location::Section(i) => {
                let s = &mut candidate.sections[i];
                (&mut s.number, &mut s.locked)
            }
            Location::Subsection(i, j) => {
                let s = &mut candidate.sections[i].subsections[j];
                (&mut s.number, &mut s.locked)
            }
        };
        *node_locked = number.is_some();
        if let Some(number) = number {
            *node_number = number;
        }
        self.commit(candidate)
    }
}

fn insertion_index<T>(
    siblings: &[T],
    after: Option<&SectionId>,
    id_of: impl Fn(&T) -> &SectionId,
) -> Result<usize, DocumentError> {
    match after {
        None => Ok(siblings.len()),
        Some(after_id) => siblings
            .iter()
            .position(|s| id_of(s) == after_id)
            .map(|i| i + 1)
            .ok_or_else(|| DocumentError::not_found("sibling section", after_id)),
    }
}

fn index_out_of_range(index: usize, len: usize) -> DocumentError {
    DocumentError::validation(format!(
        "index {} is out of range for {} sibling(s)",
        index, len
    ))
}
