//! Pagination engine
//!
//! Walks the elements of a [`ResolvedLayout`] in order and packs them onto
//! pages of fixed capacity. The unit of pagination is a node: a section's or
//! subsection's heading and text travel together, and every block or title
//! element stands alone. A unit that does not fit in the space left starts a
//! new page, and one taller than a whole page sits alone on its own page
//! flagged as overflowing. Units are never split. Pagination never fails.

use std::num::NonZeroUsize;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::resolve::{ElementOrigin, ResolvedElement, ResolvedLayout};
use crate::template::{PageGeometry, RuleKind};

const EPSILON: f64 = 1e-6;

/// Knobs for extent estimation and page breaking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationOptions {
    /// In block documents, keep a heading block on the same page as the text
    /// block after it. Section headings always stay with their own text.
    pub heading_keep_with_next: bool,
    /// Average glyph width as a fraction of the font size.
    pub chars_per_em: f64,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        PaginationOptions {
            heading_keep_with_next: true,
            chars_per_em: 0.5,
            line_height: 1.2,
        }
    }
}

fn default_font_size(element: &ResolvedElement) -> f64 {
    match element.kind {
        RuleKind::Title => 24.0,
        RuleKind::Heading => match &element.origin {
            ElementOrigin::Section { level: 2, .. } => 14.0,
            _ => 18.0,
        },
        RuleKind::Table => 10.0,
        RuleKind::Text | RuleKind::List | RuleKind::Image => 11.0,
    }
}

const DEFAULT_IMAGE_HEIGHT: f64 = 180.0;

/// Estimated vertical extent of `element` on a page of `geometry`, in points.
///
/// A numeric `height` property pins the extent; otherwise text is wrapped at
/// the content width using `fontSize`, `lineHeight` and `spacingAfter`.
pub fn estimate_extent(
    element: &ResolvedElement,
    geometry: &PageGeometry,
    options: &PaginationOptions,
) -> f64 {
    let style = &element.style;
    if let Some(height) = style.number("height") {
        return height.max(0.0) + style.number("spacingAfter").unwrap_or(0.0).max(0.0);
    }

    let font_size = style
        .number("fontSize")
        .filter(|f| *f > 0.0)
        .unwrap_or_else(|| default_font_size(element));
    let spacing = style
        .number("spacingAfter")
        .unwrap_or(font_size * 0.5)
        .max(0.0);

    if element.kind == RuleKind::Image {
        return DEFAULT_IMAGE_HEIGHT + spacing;
    }

    let line_height = style
        .number("lineHeight")
        .filter(|l| *l > 0.0)
        .unwrap_or(options.line_height);
    let glyph = (font_size * options.chars_per_em).max(EPSILON);
    let per_line = ((geometry.content_width() / glyph).floor() as usize).max(1);

    let lines: usize = element
        .label()
        .lines()
        .map(|line| line.chars().count().div_ceil(per_line).max(1))
        .sum::<usize>()
        .max(1);

    lines as f64 * font_size * line_height + spacing
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedElement {
    /// Distance from the top of the content box.
    pub offset: f64,
    pub height: f64,
    pub element: ResolvedElement,
}

/// Renderable payload of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub header: Option<String>,
    pub footer: Option<String>,
    pub elements: Vec<PlacedElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub page_number: NonZeroUsize,
    pub content: PageContent,
    pub used_height: f64,
    pub capacity: f64,
    /// Set when the page holds a single unit taller than the page.
    pub overflow: bool,
}

/// Lazy page sequence. Cloning it restarts from the clone's position.
#[derive(Debug, Clone)]
pub struct Pages<'a> {
    layout: &'a ResolvedLayout,
    geometry: PageGeometry,
    options: PaginationOptions,
    cursor: usize,
    next_number: NonZeroUsize,
}

/// Paginate with default options.
pub fn paginate<'a>(layout: &'a ResolvedLayout, geometry: &PageGeometry) -> Pages<'a> {
    paginate_with(layout, geometry, PaginationOptions::default())
}

pub fn paginate_with<'a>(
    layout: &'a ResolvedLayout,
    geometry: &PageGeometry,
    options: PaginationOptions,
) -> Pages<'a> {
    Pages {
        layout,
        geometry: *geometry,
        options,
        cursor: 0,
        next_number: NonZeroUsize::MIN,
    }
}

impl Pages<'_> {
    fn extent(&self, index: usize) -> f64 {
        estimate_extent(&self.layout.elements[index], &self.geometry, &self.options)
    }

    /// End (exclusive) of the unit starting at `start`: consecutive elements
    /// resolved from the same section node, or a single element otherwise.
    fn unit_end(&self, start: usize) -> usize {
        let elements = &self.layout.elements;
        let ElementOrigin::Section { id, .. } = &elements[start].origin else {
            return start + 1;
        };
        let mut end = start + 1;
        while let Some(ElementOrigin::Section { id: next, .. }) =
            elements.get(end).map(|e| &e.origin)
        {
            if next != id {
                break;
            }
            end += 1;
        }
        end
    }

    fn unit_extent(&self, start: usize, end: usize) -> f64 {
        (start..end).map(|i| self.extent(i)).sum()
    }

    /// True when the heading block at `start` should move to the next page so
    /// it stays with the text block after it.
    fn keep_with_next(
        &self,
        start: usize,
        end: usize,
        used: f64,
        height: f64,
        capacity: f64,
    ) -> bool {
        if !self.options.heading_keep_with_next {
            return false;
        }
        let elements = &self.layout.elements;
        let heading = &elements[start];
        if heading.kind != RuleKind::Heading
            || !matches!(heading.origin, ElementOrigin::Block { .. })
        {
            return false;
        }
        let Some(next) = elements.get(end) else {
            return false;
        };
        if next.kind != RuleKind::Text {
            return false;
        }
        let together = height + self.unit_extent(end, self.unit_end(end));
        used + together > capacity + EPSILON && together <= capacity + EPSILON
    }
}

impl Iterator for Pages<'_> {
    type Item = ReportPage;

    fn next(&mut self) -> Option<ReportPage> {
        let elements = &self.layout.elements;
        if self.cursor >= elements.len() {
            return None;
        }

        let capacity = self.geometry.capacity();
        let mut used = 0.0;
        let mut placed = Vec::new();
        let mut overflow = false;

        while self.cursor < elements.len() {
            let end = self.unit_end(self.cursor);
            let height = self.unit_extent(self.cursor, end);

            if placed.is_empty() {
                if height > capacity + EPSILON {
                    warn!(
                        "unit at element {} is {:.1}pt tall but pages hold {:.1}pt; placing it alone",
                        self.cursor, height, capacity
                    );
                    overflow = true;
                }
            } else if used + height > capacity + EPSILON
                || self.keep_with_next(self.cursor, end, used, height, capacity)
            {
                break;
            }

            for index in self.cursor..end {
                let extent = self.extent(index);
                placed.push(PlacedElement {
                    offset: used,
                    height: extent,
                    element: elements[index].clone(),
                });
                used += extent;
            }
            self.cursor = end;

            if overflow {
                break;
            }
        }

        let page_number = self.next_number;
        self.next_number = self.next_number.saturating_add(1);
        debug!(
            "page {}: {} element(s), {:.1}/{:.1}pt",
            page_number,
            placed.len(),
            used,
            capacity
        );

        Some(ReportPage {
            page_number,
            content: PageContent {
                header: self.layout.header.clone(),
                footer: self.layout.footer.clone(),
                elements: placed,
            },
            used_height: used,
            capacity,
            overflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BlockId, SectionId, TemplateId};
    use crate::resolve::{resolve, LayoutSource, ResolvedStyle};
    use crate::sections::{Parent, SectionTree};
    use crate::template::{DocumentTemplate, Margins, SectionRule, TemplateSettings};
    use std::collections::BTreeMap;

    const CAPACITY: f64 = 600.0;

    fn geometry() -> PageGeometry {
        PageGeometry::new(500.0, 700.0, Margins::uniform(25.0)).with_bands(10.0, 40.0)
    }

    fn element(kind: RuleKind, text: &str, height: Option<f64>) -> ResolvedElement {
        let mut properties = BTreeMap::new();
        if let Some(h) = height {
            properties.insert("height".to_string(), serde_json::json!(h));
        }
        ResolvedElement {
            kind,
            origin: ElementOrigin::Section {
                id: SectionId::from(text),
                number: "1".to_string(),
                level: 1,
            },
            text: text.to_string(),
            style: ResolvedStyle {
                rule_index: Some(0),
                properties,
                styles: BTreeMap::new(),
            },
        }
    }

    fn layout(elements: Vec<ResolvedElement>) -> ResolvedLayout {
        ResolvedLayout {
            template_id: TemplateId::from("tpl-test"),
            source: LayoutSource::SectionTree,
            snapshot: String::new(),
            header: Some("Header".to_string()),
            footer: None,
            css: String::new(),
            elements,
        }
    }

    fn texts(page: &ReportPage) -> Vec<&str> {
        page.content
            .elements
            .iter()
            .map(|p| p.element.text.as_str())
            .collect()
    }

    #[test]
    fn test_geometry_capacity_fixture() {
        assert_eq!(geometry().capacity(), CAPACITY);
    }

    #[test]
    fn test_half_half_full_makes_two_pages() {
        let layout = layout(vec![
            element(RuleKind::Text, "a", Some(CAPACITY / 2.0)),
            element(RuleKind::Text, "b", Some(CAPACITY / 2.0)),
            element(RuleKind::Text, "c", Some(CAPACITY)),
        ]);

        let pages: Vec<ReportPage> = paginate(&layout, &geometry()).collect();

        assert_eq!(pages.len(), 2);
        assert_eq!(texts(&pages[0]), vec!["a", "b"]);
        assert_eq!(texts(&pages[1]), vec!["c"]);
        assert_eq!(pages[0].page_number.get(), 1);
        assert_eq!(pages[1].page_number.get(), 2);
        assert!(!pages[1].overflow);
        assert_eq!(pages[0].content.elements[1].offset, CAPACITY / 2.0);
    }

    #[test]
    fn test_oversized_element_sits_alone_and_is_flagged() {
        let layout = layout(vec![
            element(RuleKind::Text, "small", Some(100.0)),
            element(RuleKind::Text, "huge", Some(CAPACITY * 2.5)),
            element(RuleKind::Text, "after", Some(100.0)),
        ]);

        let pages: Vec<ReportPage> = paginate(&layout, &geometry()).collect();

        assert_eq!(pages.len(), 3);
        assert_eq!(texts(&pages[1]), vec!["huge"]);
        assert!(pages[1].overflow);
        assert_eq!(pages[1].used_height, CAPACITY * 2.5);
        assert!(!pages[0].overflow && !pages[2].overflow);
    }

    #[test]
    fn test_page_numbers_are_contiguous() {
        let elements = (0..10)
            .map(|i| element(RuleKind::Text, &format!("e{}", i), Some(250.0)))
            .collect();
        let layout = layout(elements);
        let numbers: Vec<usize> = paginate(&layout, &geometry())
            .map(|p| p.page_number.get())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sequence_is_restartable() {
        let layout = layout(vec![
            element(RuleKind::Text, "a", Some(400.0)),
            element(RuleKind::Text, "b", Some(400.0)),
        ]);
        let pages = paginate(&layout, &geometry());
        let first: Vec<ReportPage> = pages.clone().collect();
        let second: Vec<ReportPage> = pages.collect();
        assert_eq!(first, second);
        assert_eq!(first, paginate(&layout, &geometry()).collect::<Vec<_>>());
    }

    fn block(kind: RuleKind, text: &str, height: f64) -> ResolvedElement {
        ResolvedElement {
            origin: ElementOrigin::Block {
                id: BlockId::from(text),
                ai_assisted: false,
            },
            ..element(kind, text, Some(height))
        }
    }

    #[test]
    fn test_heading_block_moves_with_its_text() {
        let layout = layout(vec![
            block(RuleKind::Text, "filler", 500.0),
            block(RuleKind::Heading, "heading", 40.0),
            block(RuleKind::Text, "body", 200.0),
        ]);

        let pages: Vec<ReportPage> = paginate(&layout, &geometry()).collect();
        assert_eq!(texts(&pages[0]), vec!["filler"]);
        assert_eq!(texts(&pages[1]), vec!["heading", "body"]);

        let options = PaginationOptions {
            heading_keep_with_next: false,
            ..PaginationOptions::default()
        };
        let pages: Vec<ReportPage> = paginate_with(&layout, &geometry(), options).collect();
        assert_eq!(texts(&pages[0]), vec!["filler", "heading"]);
    }

    fn fixed_height_template(heading: f64, text: f64) -> DocumentTemplate {
        DocumentTemplate::create(TemplateSettings {
            name: "Fixed".to_string(),
            sections: vec![
                SectionRule::new(RuleKind::Heading).with_property("height", heading),
                SectionRule::new(RuleKind::Text).with_property("height", text),
            ],
            ..TemplateSettings::default()
        })
        .unwrap()
    }

    fn labels(pages: &[ReportPage]) -> Vec<Vec<String>> {
        pages
            .iter()
            .map(|p| p.content.elements.iter().map(|e| e.element.label()).collect())
            .collect()
    }

    /// Every section node's elements must share a single page.
    fn assert_nodes_unbroken(pages: &[ReportPage]) {
        let mut home: BTreeMap<SectionId, usize> = BTreeMap::new();
        for page in pages {
            for placed in &page.content.elements {
                if let ElementOrigin::Section { id, .. } = &placed.element.origin {
                    let first = *home.entry(id.clone()).or_insert(page.page_number.get());
                    assert_eq!(first, page.page_number.get(), "{} spans pages", id);
                }
            }
        }
    }

    #[test]
    fn test_section_that_overflows_remaining_space_moves_whole() {
        let mut tree = SectionTree::new("");
        tree.insert_section(&Parent::Root, None, "A", "body a").unwrap();
        tree.insert_section(&Parent::Root, None, "B", "body b").unwrap();
        let resolved = resolve(&fixed_height_template(40.0, 500.0), &tree).unwrap();

        for keep in [true, false] {
            let options = PaginationOptions {
                heading_keep_with_next: keep,
                ..PaginationOptions::default()
            };
            let pages: Vec<ReportPage> = paginate_with(&resolved, &geometry(), options).collect();
            assert_eq!(
                labels(&pages),
                vec![vec!["1 A", "body a"], vec!["2 B", "body b"]]
            );
            assert_nodes_unbroken(&pages);
        }
    }

    #[test]
    fn test_section_taller_than_page_sits_alone() {
        let mut tree = SectionTree::new("");
        tree.insert_section(&Parent::Root, None, "Small", "").unwrap();
        tree.insert_section(&Parent::Root, None, "Big", "huge body").unwrap();
        let resolved = resolve(&fixed_height_template(40.0, 590.0), &tree).unwrap();

        let pages: Vec<ReportPage> = paginate(&resolved, &geometry()).collect();

        assert_eq!(
            labels(&pages),
            vec![vec!["1 Small"], vec!["2 Big", "huge body"]]
        );
        assert!(!pages[0].overflow);
        assert!(pages[1].overflow);
        assert_eq!(pages[1].used_height, 630.0);
        assert_nodes_unbroken(&pages);
    }

    #[test]
    fn test_subsection_at_page_boundary_moves_whole() {
        let mut tree = SectionTree::new("");
        let a = tree
            .insert_section(&Parent::Root, None, "A", "a")
            .unwrap()
            .id()
            .clone();
        tree.insert_section(&Parent::Section(a.clone()), None, "A1", "a1")
            .unwrap();
        tree.insert_section(&Parent::Section(a), None, "A2", "a2")
            .unwrap();
        let resolved = resolve(&fixed_height_template(40.0, 250.0), &tree).unwrap();

        let pages: Vec<ReportPage> = paginate(&resolved, &geometry()).collect();

        assert_eq!(
            labels(&pages),
            vec![vec!["1 A", "a", "1.1 A1", "a1"], vec!["1.2 A2", "a2"]]
        );
        assert_eq!(pages[1].content.elements[1].offset, 40.0);
        assert_nodes_unbroken(&pages);
    }

    #[test]
    fn test_empty_layout_has_no_pages() {
        let layout = layout(vec![]);
        assert_eq!(paginate(&layout, &geometry()).count(), 0);
    }

    #[test]
    fn test_pages_carry_header_and_footer() {
        let layout = layout(vec![element(RuleKind::Text, "a", Some(10.0))]);
        let page = paginate(&layout, &geometry()).next().unwrap();
        assert_eq!(page.content.header.as_deref(), Some("Header"));
        assert_eq!(page.content.footer, None);
        assert_eq!(page.capacity, CAPACITY);
    }

    #[test]
    fn test_zero_capacity_puts_each_element_alone() {
        let tight = PageGeometry::new(100.0, 50.0, Margins::uniform(30.0));
        let layout = layout(vec![
            element(RuleKind::Text, "a", Some(1.0)),
            element(RuleKind::Text, "b", Some(1.0)),
        ]);
        let pages: Vec<ReportPage> = paginate(&layout, &tight).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.overflow));
    }

    #[test]
    fn test_estimate_wraps_long_text() {
        let g = geometry();
        let options = PaginationOptions::default();
        let short = element(RuleKind::Text, "short", None);
        let long = element(RuleKind::Text, &"word ".repeat(200), None);

        let one_line = estimate_extent(&short, &g, &options);
        // 11pt text, 1.2 line height, 5.5pt spacing after.
        assert!((one_line - (11.0 * 1.2 + 5.5)).abs() < 1e-9);
        assert!(estimate_extent(&long, &g, &options) > one_line * 5.0);
    }

    #[test]
    fn test_estimate_uses_rule_font_size() {
        let g = geometry();
        let options = PaginationOptions::default();
        let mut big = element(RuleKind::Heading, "Title", None);
        big.style
            .properties
            .insert("fontSize".to_string(), serde_json::json!(30));
        big.style
            .properties
            .insert("spacingAfter".to_string(), serde_json::json!(0));
        // Heading label includes its number: "1 Title".
        assert!((estimate_extent(&big, &g, &options) - 36.0).abs() < 1e-9);
    }
}
