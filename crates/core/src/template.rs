//! Declarative page templates
//!
//! A [`DocumentTemplate`] describes page geometry and an ordered list of
//! per-content-type rendering rules. Templates are read-only once created:
//! [`DocumentTemplate::revise`] produces a new revision with a new id.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::ids::TemplateId;

/// Standard paper sizes, in PostScript points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// Portrait `(width, height)` in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PaperSize::A3 => (841.89, 1190.55),
            PaperSize::A4 => (595.28, 841.89),
            PaperSize::A5 => (419.53, 595.28),
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSize {
    Named(PaperSize),
    Custom { width: f64, height: f64 },
}

impl PageSize {
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::Named(paper) => paper.dimensions(),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Named(PaperSize::A4)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(value: f64) -> Self {
        Margins {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Margins::uniform(72.0)
    }
}

/// A header or footer band reserved on every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub height: f64,
    #[serde(default)]
    pub content: String,
}

/// Content type a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Title,
    Heading,
    Text,
    Image,
    Table,
    List,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Title => "title",
            RuleKind::Heading => "heading",
            RuleKind::Text => "text",
            RuleKind::Image => "image",
            RuleKind::Table => "table",
            RuleKind::List => "list",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(RuleKind::Title),
            "heading" => Ok(RuleKind::Heading),
            "text" => Ok(RuleKind::Text),
            "image" => Ok(RuleKind::Image),
            "table" => Ok(RuleKind::Table),
            "list" => Ok(RuleKind::List),
            other => Err(DocumentError::validation(format!(
                "unknown rule type {:?}",
                other
            ))),
        }
    }
}

/// How elements of one content type are rendered. A rule is not content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
}

impl SectionRule {
    pub fn new(kind: RuleKind) -> Self {
        SectionRule {
            kind,
            content: None,
            properties: BTreeMap::new(),
            styles: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(key.into(), value.into());
        self
    }
}

/// Everything about a template except its identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSettings {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Band>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Band>,
    #[serde(default)]
    pub sections: Vec<SectionRule>,
    #[serde(default)]
    pub css: String,
}

impl TemplateSettings {
    pub fn validate(&self) -> Result<(), DocumentError> {
        let (width, height) = self.page_size.dimensions();
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(DocumentError::validation(format!(
                "page size must be positive, got {}x{}",
                width, height
            )));
        }
        let m = &self.margins;
        for (side, value) in [
            ("top", m.top),
            ("right", m.right),
            ("bottom", m.bottom),
            ("left", m.left),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DocumentError::validation(format!(
                    "{} margin must be non-negative, got {}",
                    side, value
                )));
            }
        }
        for (name, band) in [("header", &self.header), ("footer", &self.footer)] {
            if let Some(band) = band {
                if !band.height.is_finite() || band.height < 0.0 {
                    return Err(DocumentError::validation(format!(
                        "{} height must be non-negative, got {}",
                        name, band.height
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TemplateRepr")]
pub struct DocumentTemplate {
    id: TemplateId,
    #[serde(flatten)]
    settings: TemplateSettings,
}

#[derive(Deserialize)]
struct TemplateRepr {
    id: TemplateId,
    #[serde(flatten)]
    settings: TemplateSettings,
}

impl TryFrom<TemplateRepr> for DocumentTemplate {
    type Error = DocumentError;

    fn try_from(repr: TemplateRepr) -> Result<Self, Self::Error> {
        repr.settings.validate()?;
        Ok(DocumentTemplate {
            id: repr.id,
            settings: repr.settings,
        })
    }
}

impl DocumentTemplate {
    /// Validate settings and mint a new template id for them.
    pub fn create(settings: TemplateSettings) -> Result<Self, DocumentError> {
        settings.validate()?;
        Ok(DocumentTemplate {
            id: TemplateId::generate(),
            settings,
        })
    }

    /// A new revision with edited settings and a fresh id. `self` is untouched.
    pub fn revise(
        &self,
        edit: impl FnOnce(&mut TemplateSettings),
    ) -> Result<DocumentTemplate, DocumentError> {
        let mut settings = self.settings.clone();
        edit(&mut settings);
        DocumentTemplate::create(settings)
    }

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &TemplateSettings {
        &self.settings
    }

    pub fn rules(&self) -> &[SectionRule] {
        &self.settings.sections
    }

    /// Index of the first rule for `kind`, if any.
    pub fn rule_for(&self, kind: RuleKind) -> Option<(usize, &SectionRule)> {
        self.rules().iter().enumerate().find(|(_, r)| r.kind == kind)
    }

    pub fn geometry(&self) -> PageGeometry {
        let (w, h) = self.settings.page_size.dimensions();
        let (width, height) = match self.settings.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        };
        PageGeometry {
            width,
            height,
            margins: self.settings.margins,
            header_height: self.settings.header.as_ref().map_or(0.0, |b| b.height),
            footer_height: self.settings.footer.as_ref().map_or(0.0, |b| b.height),
        }
    }
}

/// Physical page box used by the paginator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margins: Margins,
    #[serde(default)]
    pub header_height: f64,
    #[serde(default)]
    pub footer_height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64, margins: Margins) -> Self {
        PageGeometry {
            width,
            height,
            margins,
            header_height: 0.0,
            footer_height: 0.0,
        }
    }

    pub fn with_bands(mut self, header_height: f64, footer_height: f64) -> Self {
        self.header_height = header_height;
        self.footer_height = footer_height;
        self
    }

    pub fn content_width(&self) -> f64 {
        (self.width - self.margins.left - self.margins.right).max(0.0)
    }

    /// Vertical space left for content once margins and bands are reserved.
    pub fn capacity(&self) -> f64 {
        (self.height
            - self.margins.top
            - self.margins.bottom
            - self.header_height
            - self.footer_height)
            .max(0.0)
    }
}
