//! Template resolver
//!
//! Binds template rules to the elements of one render pass. There are two
//! passes, one per document view:
//!
//! - [`resolve`] consumes a [`SectionTree`]: the report title, then every
//!   section and subsection as a heading followed by its text.
//! - [`resolve_document`] consumes a block [`Document`], one element per block.
//!
//! Each element takes the first template rule of its type. Elements with no
//! rule fall back to the built-in style. Resolution is pure, so results can be
//! memoized by `(template id, snapshot hash)` in a [`LayoutCache`].

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};

use log::debug;
use serde::Serialize;

use crate::blocks::{BlockKind, Document};
use crate::error::DocumentError;
use crate::ids::{BlockId, SectionId, TemplateId};
use crate::sections::SectionTree;
use crate::template::{DocumentTemplate, RuleKind};

/// Which document view a layout was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutSource {
    SectionTree,
    Document,
}

/// Where a resolved element came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "from", rename_all = "camelCase")]
pub enum ElementOrigin {
    ReportTitle,
    #[serde(rename_all = "camelCase")]
    Section {
        id: SectionId,
        number: String,
        level: u8,
    },
    #[serde(rename_all = "camelCase")]
    Block { id: BlockId, ai_assisted: bool },
}

/// Style applied to an element: the matched rule's mappings, or none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStyle {
    /// Index of the matched rule in the template, `None` for the built-in default.
    pub rule_index: Option<usize>,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub styles: BTreeMap<String, String>,
}

impl ResolvedStyle {
    pub fn is_default(&self) -> bool {
        self.rule_index.is_none()
    }

    /// Numeric rule property, accepting JSON numbers and numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedElement {
    pub kind: RuleKind,
    pub origin: ElementOrigin,
    pub text: String,
    pub style: ResolvedStyle,
}

impl ResolvedElement {
    /// Text as displayed, with the section number in front of headings.
    pub fn label(&self) -> String {
        match &self.origin {
            ElementOrigin::Section { number, .. } if self.kind == RuleKind::Heading => {
                format!("{} {}", number, self.text)
            }
            _ => self.text.clone(),
        }
    }

    pub fn is_ai_assisted(&self) -> bool {
        matches!(
            self.origin,
            ElementOrigin::Block {
                ai_assisted: true,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLayout {
    pub template_id: TemplateId,
    pub source: LayoutSource,
    /// Hash of the input the layout was resolved from.
    pub snapshot: String,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub css: String,
    pub elements: Vec<ResolvedElement>,
}

struct Resolver<'t> {
    template: &'t DocumentTemplate,
    elements: Vec<ResolvedElement>,
    defaulted: usize,
}

impl<'t> Resolver<'t> {
    fn new(template: &'t DocumentTemplate) -> Result<Self, DocumentError> {
        if template.rules().is_empty() {
            return Err(DocumentError::TemplateMismatch(template.id().to_string()));
        }
        Ok(Resolver {
            template,
            elements: Vec::new(),
            defaulted: 0,
        })
    }

    fn push(&mut self, kind: RuleKind, origin: ElementOrigin, text: &str) {
        let style = match self.template.rule_for(kind) {
            Some((index, rule)) => ResolvedStyle {
                rule_index: Some(index),
                properties: rule.properties.clone(),
                styles: rule.styles.clone(),
            },
            None => {
                self.defaulted += 1;
                ResolvedStyle::default()
            }
        };
        self.elements.push(ResolvedElement {
            kind,
            origin,
            text: text.to_string(),
            style,
        });
    }

    fn finish(self, source: LayoutSource, snapshot: String) -> ResolvedLayout {
        let settings = self.template.settings();
        debug!(
            "resolved {} element(s) against template {} ({} on default style)",
            self.elements.len(),
            self.template.id(),
            self.defaulted
        );
        ResolvedLayout {
            template_id: self.template.id().clone(),
            source,
            snapshot,
            header: settings.header.as_ref().map(|b| b.content.clone()),
            footer: settings.footer.as_ref().map(|b| b.content.clone()),
            css: settings.css.clone(),
            elements: self.elements,
        }
    }
}

/// Bind `template` to the nodes of `tree`, in document order.
pub fn resolve(
    template: &DocumentTemplate,
    tree: &SectionTree,
) -> Result<ResolvedLayout, DocumentError> {
    let mut resolver = Resolver::new(template)?;

    if !tree.title().trim().is_empty() {
        resolver.push(RuleKind::Title, ElementOrigin::ReportTitle, tree.title());
    }
    for node in tree.nodes() {
        let origin = ElementOrigin::Section {
            id: node.id().clone(),
            number: node.number().to_string(),
            level: node.depth(),
        };
        resolver.push(RuleKind::Heading, origin.clone(), node.title());
        if !node.content().trim().is_empty() {
            resolver.push(RuleKind::Text, origin, node.content());
        }
    }

    Ok(resolver.finish(LayoutSource::SectionTree, snapshot_hash(tree)))
}

/// Rule type a block renders with. Unrecognised tags render as text.
pub fn rule_kind_for(kind: &BlockKind) -> RuleKind {
    match kind {
        BlockKind::Paragraph => RuleKind::Text,
        BlockKind::Heading => RuleKind::Heading,
        BlockKind::Image => RuleKind::Image,
        BlockKind::Table => RuleKind::Table,
        BlockKind::List => RuleKind::List,
        BlockKind::Title => RuleKind::Title,
        BlockKind::Other(tag) => tag.parse().unwrap_or(RuleKind::Text),
    }
}

/// Bind `template` to the blocks of `document`, in reading order.
///
/// Provenance is copied from each block onto its element and nowhere else.
pub fn resolve_document(
    template: &DocumentTemplate,
    document: &Document,
) -> Result<ResolvedLayout, DocumentError> {
    let mut resolver = Resolver::new(template)?;
    for block in document.blocks() {
        let origin = ElementOrigin::Block {
            id: block.id.clone(),
            ai_assisted: block.ai_assisted,
        };
        resolver.push(rule_kind_for(&block.kind), origin, &block.content);
    }
    Ok(resolver.finish(LayoutSource::Document, document_hash(document)))
}

fn push_field(canonical: &mut String, value: &str) {
    canonical.push_str(&value.len().to_string());
    canonical.push(':');
    canonical.push_str(value);
}

/// Content hash of a tree snapshot: ids, numbers, locks, titles and text.
pub fn snapshot_hash(tree: &SectionTree) -> String {
    let mut canonical = String::new();
    push_field(&mut canonical, tree.title());
    for node in tree.nodes() {
        push_field(&mut canonical, &node.depth().to_string());
        push_field(&mut canonical, node.id().as_str());
        push_field(&mut canonical, node.number());
        push_field(&mut canonical, if node.is_locked() { "L" } else { "" });
        push_field(&mut canonical, node.title());
        push_field(&mut canonical, node.content());
    }
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

/// Content hash of a block document, provenance included.
pub fn document_hash(document: &Document) -> String {
    let mut canonical = String::new();
    push_field(&mut canonical, document.id().as_str());
    push_field(&mut canonical, document.title());
    for block in document.blocks() {
        push_field(&mut canonical, block.id.as_str());
        push_field(&mut canonical, block.kind.as_str());
        push_field(&mut canonical, &block.content);
        push_field(&mut canonical, if block.ai_assisted { "A" } else { "" });
    }
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

type CacheKey = (TemplateId, String);

/// Memoized [`resolve`] keyed by template id and tree snapshot hash.
///
/// Holds at most `capacity` layouts; the oldest entry is evicted first.
#[derive(Debug)]
pub struct LayoutCache {
    entries: HashMap<CacheKey, ResolvedLayout>,
    order: VecDeque<CacheKey>,
    capacity: usize,
    hits: usize,
    misses: usize,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::with_capacity(LayoutCache::DEFAULT_CAPACITY)
    }
}

impl LayoutCache {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` layouts (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        LayoutCache {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    pub fn resolve(
        &mut self,
        template: &DocumentTemplate,
        tree: &SectionTree,
    ) -> Result<&ResolvedLayout, DocumentError> {
        let key = (template.id().clone(), snapshot_hash(tree));
        if !self.entries.contains_key(&key) {
            self.make_room();
        }
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                debug!("layout cache hit for template {}", template.id());
                Ok(&*entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                debug!("layout cache miss for template {}", template.id());
                let layout = resolve(template, tree)?;
                self.order.push_back(entry.key().clone());
                Ok(&*entry.insert(layout))
            }
        }
    }

    fn make_room(&mut self) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!("layout cache evicted template {} snapshot {}", oldest.0, oldest.1);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::Parent;
    use crate::template::{SectionRule, TemplateSettings};

    fn template(rules: Vec<SectionRule>) -> DocumentTemplate {
        DocumentTemplate::create(TemplateSettings {
            name: "Test".to_string(),
            sections: rules,
            ..TemplateSettings::default()
        })
        .unwrap()
    }

    fn tree() -> SectionTree {
        let mut tree = SectionTree::new("Quarterly review");
        let intro = tree
            .insert_section(&Parent::Root, None, "Intro", "Why we are here.")
            .unwrap()
            .id()
            .clone();
        tree.insert_section(&Parent::Section(intro), None, "Background", "")
            .unwrap();
        tree
    }

    #[test]
    fn test_heading_only_template_falls_back_for_text() {
        let mut tree = SectionTree::new("");
        tree.insert_section(&Parent::Root, None, "Notes", "Plain body text")
            .unwrap();
        let template = template(vec![SectionRule::new(RuleKind::Heading)]);

        let layout = resolve(&template, &tree).unwrap();

        assert_eq!(layout.elements.len(), 2);
        assert_eq!(layout.elements[0].kind, RuleKind::Heading);
        assert_eq!(layout.elements[0].style.rule_index, Some(0));
        assert_eq!(layout.elements[1].kind, RuleKind::Text);
        assert!(layout.elements[1].style.is_default());
    }

    #[test]
    fn test_empty_rule_list_is_a_mismatch() {
        let template = template(vec![]);
        let err = resolve(&template, &tree()).unwrap_err();
        assert!(matches!(err, DocumentError::TemplateMismatch(_)));
    }

    #[test]
    fn test_elements_follow_document_order() {
        let template = template(vec![
            SectionRule::new(RuleKind::Text),
            SectionRule::new(RuleKind::Heading).with_property("fontSize", 20),
            SectionRule::new(RuleKind::Heading).with_property("fontSize", 99),
        ]);
        let layout = resolve(&template, &tree()).unwrap();

        let labels: Vec<String> = layout.elements.iter().map(|e| e.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Quarterly review",
                "1 Intro",
                "Why we are here.",
                "1.1 Background"
            ]
        );
        assert_eq!(layout.elements[0].kind, RuleKind::Title);
        assert!(layout.elements[0].style.is_default());
        assert_eq!(layout.elements[1].style.number("fontSize"), Some(20.0));
        assert_eq!(layout.source, LayoutSource::SectionTree);
    }

    #[test]
    fn test_document_pass_carries_block_provenance() {
        let mut doc = Document::new("Blocks");
        doc.insert_block(None, "heading", "Summary", false).unwrap();
        doc.insert_block(None, "paragraph", "Drafted by the assistant", true)
            .unwrap();
        doc.insert_block(None, "callout", "Odd one", false).unwrap();
        let template = template(vec![SectionRule::new(RuleKind::Text)]);

        let layout = resolve_document(&template, &doc).unwrap();

        assert_eq!(layout.source, LayoutSource::Document);
        let kinds: Vec<RuleKind> = layout.elements.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![RuleKind::Heading, RuleKind::Text, RuleKind::Text]);
        assert!(!layout.elements[0].is_ai_assisted());
        assert!(layout.elements[1].is_ai_assisted());
    }

    #[test]
    fn test_section_elements_never_claim_ai_provenance() {
        let template = template(vec![SectionRule::new(RuleKind::Heading)]);
        let layout = resolve(&template, &tree()).unwrap();
        assert!(layout.elements.iter().all(|e| !e.is_ai_assisted()));
    }

    #[test]
    fn test_snapshot_hash_tracks_content() {
        let mut t = tree();
        let before = snapshot_hash(&t);
        assert_eq!(before, snapshot_hash(&t.clone()));

        let id = t.sections()[0].id.clone();
        t.update_section(&id, None, Some("Changed".to_string()))
            .unwrap();
        assert_ne!(before, snapshot_hash(&t));
    }

    #[test]
    fn test_layout_cache_hits_on_same_snapshot() {
        let template = template(vec![SectionRule::new(RuleKind::Heading)]);
        let mut t = tree();
        let mut cache = LayoutCache::new();

        cache.resolve(&template, &t).unwrap();
        cache.resolve(&template, &t.clone()).unwrap();
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        t.set_title("Renamed");
        let layout = cache.resolve(&template, &t).unwrap();
        assert_eq!(layout.elements[0].text, "Renamed");
        assert_eq!((cache.hits(), cache.misses()), (1, 2));
        assert_eq!(cache.len(), 2);

        let revised = template.revise(|_| {}).unwrap();
        cache.resolve(&revised, &t).unwrap();
        assert_eq!(cache.misses(), 3);
    }

    #[test]
    fn test_layout_cache_evicts_oldest_snapshot() {
        let template = template(vec![SectionRule::new(RuleKind::Heading)]);
        let trees: Vec<SectionTree> = (0..3)
            .map(|i| SectionTree::new(format!("Report {}", i)))
            .collect();
        let mut cache = LayoutCache::with_capacity(2);

        for tree in &trees {
            cache.resolve(&template, tree).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.misses(), 3);

        cache.resolve(&template, &trees[2]).unwrap();
        assert_eq!(cache.hits(), 1);

        cache.resolve(&template, &trees[0]).unwrap();
        assert_eq!(cache.misses(), 4);
        assert_eq!(cache.len(), 2);

        cache.resolve(&template, &trees[1]).unwrap();
        assert_eq!(cache.misses(), 5);
    }

    #[test]
    fn test_style_number_accepts_strings() {
        let style = ResolvedStyle {
            rule_index: Some(0),
            properties: BTreeMap::from([
                ("height".to_string(), serde_json::json!("120")),
                ("fontSize".to_string(), serde_json::json!(true)),
            ]),
            styles: BTreeMap::new(),
        };
        assert_eq!(style.number("height"), Some(120.0));
        assert_eq!(style.number("fontSize"), None);
        assert_eq!(style.number("missing"), None);
    }
}
