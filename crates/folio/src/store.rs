//! File persistence for reports, documents, and templates.
//!
//! Reports and documents are stored as pretty-printed JSON. Templates may be
//! JSON or TOML, picked by file extension. Saves go through a temporary file
//! in the destination directory and are renamed into place.

use crate::prelude::*;
use folio_core::template::TemplateSettings;
use folio_core::{Document, DocumentTemplate, SectionTree};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
        Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Format::Toml),
        _ => Err(Error::UnsupportedFormat(path.display().to_string()).into()),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| f!("Failed to read {}", path.display()))
}

fn parse<T: DeserializeOwned>(path: &Path, text: &str, format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_str(text)
            .map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e)),
        Format::Toml => {
            toml::from_str(text).map_err(|e| eyre!("Failed to parse {}: {}", path.display(), e))
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    parse(path, &read(path)?, Format::Json)
}

/// Serialize `value` as JSON and atomically replace `path` with it.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let persist_err = |reason: String| Error::Persist {
        path: path.display().to_string(),
        reason,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| persist_err(e.to_string()))?;
    file.write_all(bytes)
        .map_err(|e| persist_err(e.to_string()))?;
    file.persist(path)
        .map_err(|e| persist_err(e.error.to_string()))?;
    log::debug!("saved {} byte(s) to {}", bytes.len(), path.display());
    Ok(())
}

pub fn load_report(path: &Path) -> Result<SectionTree> {
    load_json(path)
}

pub fn save_report(path: &Path, tree: &SectionTree) -> Result<()> {
    save_json(path, tree)
}

pub fn load_document(path: &Path) -> Result<Document> {
    load_json(path)
}

pub fn save_document(path: &Path, document: &Document) -> Result<()> {
    save_json(path, document)
}

#[derive(serde::Deserialize)]
struct TemplateHeader {
    id: Option<IgnoredAny>,
}

/// Load a template file.
///
/// A file with an `id` is a stored template revision and keeps its id. A
/// file without one holds bare settings and gets a freshly minted id.
pub fn load_template(path: &Path) -> Result<DocumentTemplate> {
    let format = format_of(path)?;
    let text = read(path)?;
    let header: TemplateHeader = parse(path, &text, format)?;

    if header.id.is_some() {
        parse(path, &text, format)
    } else {
        let settings: TemplateSettings = parse(path, &text, format)?;
        DocumentTemplate::create(settings)
            .map_err(|e| eyre!("Invalid template {}: {}", path.display(), e))
    }
}

/// A file handed to `render`: either a report or a block document.
#[derive(Debug, Clone)]
pub enum Source {
    Report(SectionTree),
    Document(Document),
}

#[derive(serde::Deserialize)]
struct SourceHeader {
    blocks: Option<IgnoredAny>,
}

/// Load a report or a document, telling them apart by the `blocks` key.
pub fn load_source(path: &Path) -> Result<Source> {
    let text = read(path)?;
    let header: SourceHeader = parse(path, &text, Format::Json)?;
    if header.blocks.is_some() {
        Ok(Source::Document(parse(path, &text, Format::Json)?))
    } else {
        Ok(Source::Report(parse(path, &text, Format::Json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::template::RuleKind;
    use folio_core::Parent;

    #[test]
    fn test_report_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut tree = SectionTree::new("Annual");
        let intro = tree
            .insert_section(&Parent::Root, None, "Intro", "Text")
            .unwrap()
            .id()
            .clone();
        tree.insert_section(&Parent::Section(intro.clone()), None, "Scope", "")
            .unwrap();
        tree.lock_number(&intro, "A").unwrap();

        save_report(&path, &tree).unwrap();
        let loaded = load_report(&path).unwrap();

        assert_eq!(loaded, tree);
        assert!(loaded.get_section(&intro).unwrap().is_locked());
        assert!(dir.path().read_dir().unwrap().count() == 1);
    }

    #[test]
    fn test_document_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let mut doc = Document::new("Notes");
        doc.insert_block(None, "paragraph", "AI draft", true).unwrap();
        doc.insert_block(None, "callout", "Kept tag", false).unwrap();

        save_document(&path, &doc).unwrap();
        assert_eq!(load_document(&path).unwrap(), doc);
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        save_report(&path, &SectionTree::new("One")).unwrap();
        save_report(&path, &SectionTree::new("Two")).unwrap();
        assert_eq!(load_report(&path).unwrap().title(), "Two");
    }

    #[test]
    fn test_template_from_toml_settings_gets_new_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.toml");
        std::fs::write(
            &path,
            r#"
            name = "Plain"
            pageSize = "Letter"
            orientation = "landscape"

            [[sections]]
            type = "heading"
            properties = { fontSize = 16 }
            "#,
        )
        .unwrap();

        let template = load_template(&path).unwrap();
        assert_eq!(template.name(), "Plain");
        assert!(template.id().as_str().starts_with("tpl-"));
        assert_eq!(template.rules()[0].kind, RuleKind::Heading);
        assert_eq!(template.geometry().width, 792.0);
    }

    #[test]
    fn test_stored_template_keeps_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stored.json");
        std::fs::write(
            &path,
            r#"{"id": "tpl-fixed", "name": "Stored", "sections": [{"type": "text"}]}"#,
        )
        .unwrap();

        let template = load_template(&path).unwrap();
        assert_eq!(template.id().as_str(), "tpl-fixed");
    }

    #[test]
    fn test_template_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.yaml");
        std::fs::write(&path, "name: Plain").unwrap();
        assert!(load_template(&path).is_err());
    }

    #[test]
    fn test_invalid_template_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"name": "Bad", "margins": {"top": -1, "right": 0, "bottom": 0, "left": 0}}"#,
        )
        .unwrap();
        assert!(load_template(&path).is_err());
    }

    #[test]
    fn test_load_source_tells_reports_from_documents() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("r.json");
        let doc = dir.path().join("d.json");
        save_report(&report, &SectionTree::new("R")).unwrap();
        save_document(&doc, &Document::new("D")).unwrap();

        assert!(matches!(load_source(&report).unwrap(), Source::Report(_)));
        assert!(matches!(load_source(&doc).unwrap(), Source::Document(_)));
    }
}
