//! Core library for folio
//!
//! This crate implements the **Functional Core** of the folio report builder,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`folio_core`** (this crate): document models and pure transformations, no I/O
//! - **`folio`**: the CLI that loads, saves, and prints (the Imperative Shell)
//!
//! Everything here operates on in-memory values. Mutations on a
//! [`SectionTree`] or [`Document`] are transactional: they either succeed and
//! leave the value consistent, or fail and leave it untouched.
//!
//! # Module Organization
//!
//! - [`sections`]: the numbered section tree and its editing operations
//! - [`numbering`]: derives section numbers and validates locked ones
//! - [`blocks`]: block documents, images, and AI-provenance flags
//! - [`template`]: document templates, section rules, and page geometry
//! - [`resolve`]: binds template rules to a tree or block document
//! - [`paginate`]: packs resolved elements onto fixed-size pages
//!
//! # Example Usage
//!
//! ```rust
//! use folio_core::sections::{Parent, SectionTree};
//! use folio_core::template::{DocumentTemplate, RuleKind, SectionRule, TemplateSettings};
//! use folio_core::paginate::PaginationOptions;
//!
//! let mut tree = SectionTree::new("Annual report");
//! tree.insert_section(&Parent::Root, None, "Introduction", "Hello.").unwrap();
//!
//! let template = DocumentTemplate::create(TemplateSettings {
//!     name: "Plain".to_string(),
//!     sections: vec![SectionRule::new(RuleKind::Heading)],
//!     ..TemplateSettings::default()
//! })
//! .unwrap();
//!
//! let pages = folio_core::render(&template, &tree, PaginationOptions::default()).unwrap();
//! assert_eq!(pages.len(), 1);
//! assert_eq!(pages[0].content.elements[1].element.label(), "1 Introduction");
//! ```

pub mod blocks;
pub mod error;
pub mod ids;
pub mod numbering;
pub mod paginate;
pub mod resolve;
pub mod sections;
pub mod template;

pub use blocks::{Block, BlockKind, BlockStore, Document};
pub use error::DocumentError;
pub use paginate::{paginate, paginate_with, PaginationOptions, ReportPage};
pub use resolve::{resolve, resolve_document, LayoutCache, ResolvedLayout};
pub use sections::{Parent, SectionTree};
pub use template::{DocumentTemplate, PageGeometry};

/// Resolve `tree` against `template` and paginate it on the template's page.
pub fn render(
    template: &DocumentTemplate,
    tree: &SectionTree,
    options: PaginationOptions,
) -> Result<Vec<ReportPage>, DocumentError> {
    let layout = resolve(template, tree)?;
    Ok(paginate_with(&layout, &template.geometry(), options).collect())
}

/// Resolve a block `document` against `template` and paginate it.
pub fn render_document(
    template: &DocumentTemplate,
    document: &Document,
    options: PaginationOptions,
) -> Result<Vec<ReportPage>, DocumentError> {
    let layout = resolve_document(template, document)?;
    Ok(paginate_with(&layout, &template.geometry(), options).collect())
}
