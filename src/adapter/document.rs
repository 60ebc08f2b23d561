//! Document adapter: segments regulatory text into hierarchical units
//!
//! Input is either a PDF, read page by page, or UTF-8 text with pages
//! separated by form feeds (the output of `pdftotext`). A framework's
//! `Catalog` says which lines are headings, how a heading's identifier
//! becomes an external id, and which unit it is PART_OF. Lines between
//! headings become the unit's description.

use super::fetch::RawSource;
use super::pdf;
use super::traits::{AdapterConfig, AdapterEvents, FrameworkAdapter};
use super::types::{AdapterEvent, LinkRecord, ParseError, UnitRecord, UnitRef};
use crate::graph::{Citation, Framework, NodeKind, Properties, Relation};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Pages read per document unless configured otherwise.
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// How a heading's `id` capture becomes the unit's external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    Verbatim,
    /// Prepend a fixed prefix: `3` -> `CIS-3`
    Prefixed(&'static str),
    /// Prepend the id of the enclosing unit of a kind: `(a)(1)` -> `164.308(a)(1)`
    QualifiedBy(NodeKind),
}

/// Which unit a heading is PART_OF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRule {
    Root,
    /// The most recent unit of a kind above this heading
    Enclosing(NodeKind),
    /// The id up to the last delimiter, when that unit appeared earlier:
    /// `GV.OC-01` -> `GV.OC`
    Prefix { kind: NodeKind, delimiter: char },
}

/// One kind of heading line.
///
/// `pattern` must capture `id` and may capture `title` and `text` (inline
/// description). A line matching `marker` but not `pattern` is a heading
/// whose identifier could not be extracted.
#[derive(Debug, Clone)]
pub struct HeadingRule {
    pub kind: NodeKind,
    pub pattern: Regex,
    pub marker: Option<Regex>,
    pub id_scheme: IdScheme,
    pub parent: ParentRule,
}

impl HeadingRule {
    pub fn new(kind: NodeKind, pattern: Regex, id_scheme: IdScheme, parent: ParentRule) -> Self {
        Self {
            kind,
            pattern,
            marker: None,
            id_scheme,
            parent,
        }
    }

    pub fn with_marker(mut self, marker: Regex) -> Self {
        self.marker = Some(marker);
        self
    }
}

/// A body line that becomes a property instead of description text.
///
/// `pattern` must capture `value`.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub key: &'static str,
    pub pattern: Regex,
    /// Split the value on commas into a list
    pub list: bool,
}

/// Segmentation rules for one document-based framework.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub framework: Framework,
    /// Tried in order; the first matching pattern wins
    pub rules: Vec<HeadingRule>,
    pub fields: Vec<FieldRule>,
}

/// Adapter for the five document-based frameworks.
#[derive(Debug, Clone)]
pub struct DocumentAdapter {
    catalog: Arc<Catalog>,
}

impl DocumentAdapter {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl FrameworkAdapter for DocumentAdapter {
    fn framework(&self) -> Framework {
        self.catalog.framework
    }

    fn parse(&self, raw: RawSource, config: &AdapterConfig) -> AdapterEvents {
        Box::new(DocumentEvents::new(
            self.catalog.clone(),
            raw,
            config.document_id.clone(),
            config.page_limit,
        ))
    }
}

struct OpenUnit {
    unit: UnitRef,
    name: String,
    heading: String,
    body: Vec<String>,
    properties: Properties,
    page: usize,
    parent: Option<UnitRef>,
}

struct DocumentEvents {
    catalog: Arc<Catalog>,
    document_id: String,
    /// (1-based page, line)
    lines: std::vec::IntoIter<(usize, String)>,
    queue: VecDeque<AdapterEvent>,
    current: Option<OpenUnit>,
    /// Body lines after a malformed heading belong to no unit
    discarding: bool,
    /// Most recent external id per kind
    enclosing: HashMap<NodeKind, String>,
    seen: HashSet<(NodeKind, String)>,
    finished: bool,
}

impl DocumentEvents {
    fn new(
        catalog: Arc<Catalog>,
        raw: RawSource,
        document_id: String,
        page_limit: Option<usize>,
    ) -> Self {
        let mut events = Self {
            catalog,
            document_id,
            lines: Vec::new().into_iter(),
            queue: VecDeque::new(),
            current: None,
            discarding: false,
            enclosing: HashMap::new(),
            seen: HashSet::new(),
            finished: false,
        };

        match read_pages(raw, page_limit) {
            Ok(pages) => {
                let lines: Vec<(usize, String)> = pages
                    .iter()
                    .take(page_limit.unwrap_or(usize::MAX))
                    .enumerate()
                    .flat_map(|(i, page)| page.lines().map(move |line| (i + 1, line.to_string())))
                    .collect();
                events.lines = lines.into_iter();
            }
            Err(e) => {
                events.queue.push_back(e.into());
                events.finished = true;
            }
        }
        events
    }

    fn visit_line(&mut self, page: usize, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }

        let catalog = self.catalog.clone();
        for rule in &catalog.rules {
            if let Some(caps) = rule.pattern.captures(line) {
                self.open(rule, &caps, page, line);
                return;
            }
        }

        for rule in &catalog.rules {
            if rule.marker.as_ref().is_some_and(|m| m.is_match(line)) {
                self.reject(ParseError::MissingIdentifier {
                    kind: rule.kind,
                    location: format!("page {}", page),
                    line: line.to_string(),
                });
                return;
            }
        }

        if self.discarding {
            return;
        }
        let Some(unit) = self.current.as_mut() else {
            return;
        };

        for field in &catalog.fields {
            if let Some(caps) = field.pattern.captures(line) {
                let value = caps.name("value").map_or("", |m| m.as_str()).trim();
                if field.list {
                    let items: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                    unit.properties.insert(field.key, items);
                } else {
                    unit.properties.insert(field.key, value);
                }
                return;
            }
        }
        unit.body.push(line.to_string());
    }

    fn reject(&mut self, error: ParseError) {
        self.close_current();
        self.discarding = true;
        self.queue.push_back(error.into());
    }

    fn open(&mut self, rule: &HeadingRule, caps: &Captures<'_>, page: usize, line: &str) {
        let raw_id = caps.name("id").map_or("", |m| m.as_str()).trim();
        let title = caps.name("title").map_or("", |m| m.as_str()).trim();
        let text = caps.name("text").map_or("", |m| m.as_str()).trim();

        let external_id = match rule.id_scheme {
            IdScheme::Verbatim => raw_id.to_string(),
            IdScheme::Prefixed(prefix) => format!("{}{}", prefix, raw_id),
            IdScheme::QualifiedBy(kind) => match self.enclosing.get(&kind) {
                Some(outer) => format!("{}{}", outer, raw_id),
                None => {
                    self.reject(ParseError::MissingIdentifier {
                        kind: rule.kind,
                        location: format!("page {}", page),
                        line: format!("{} (outside any {})", line, kind),
                    });
                    return;
                }
            },
        };

        let parent = match rule.parent {
            ParentRule::Root => None,
            ParentRule::Enclosing(kind) => self
                .enclosing
                .get(&kind)
                .map(|id| UnitRef::of(kind, id.as_str())),
            ParentRule::Prefix { kind, delimiter } => external_id
                .rsplit_once(delimiter)
                .map(|(prefix, _)| prefix)
                .filter(|prefix| self.seen.contains(&(kind, prefix.to_string())))
                .map(|prefix| UnitRef::of(kind, prefix)),
        };

        self.close_current();
        self.discarding = false;
        self.enclosing.insert(rule.kind, external_id.clone());
        self.seen.insert((rule.kind, external_id.clone()));

        let mut body = Vec::new();
        if !text.is_empty() {
            body.push(text.to_string());
        }
        self.current = Some(OpenUnit {
            unit: UnitRef::of(rule.kind, external_id),
            name: title.to_string(),
            heading: line.to_string(),
            body,
            properties: Properties::new(),
            page,
            parent,
        });
    }

    fn close_current(&mut self) {
        let Some(open) = self.current.take() else {
            return;
        };
        let description = open.body.join(" ");
        let excerpt = if description.is_empty() {
            open.heading.clone()
        } else {
            format!("{} {}", open.heading, description)
        };

        self.queue.push_back(
            UnitRecord {
                unit: open.unit.clone(),
                name: open.name,
                description,
                properties: open.properties,
                citation: Some(Citation::new(
                    &self.document_id,
                    format!("page {}", open.page),
                    excerpt,
                )),
            }
            .into(),
        );
        if let Some(parent) = open.parent {
            self.queue
                .push_back(LinkRecord::asserted(Relation::PartOf, open.unit, parent).into());
        }
    }
}

/// Page texts of a PDF, or of form-feed separated text.
fn read_pages(raw: RawSource, page_limit: Option<usize>) -> Result<Vec<String>, ParseError> {
    if pdf::is_pdf(&raw.bytes) {
        return pdf::page_texts(&raw.bytes, page_limit).map_err(|e| ParseError::Unreadable {
            expected: "PDF",
            detail: e.to_string(),
        });
    }
    let text = String::from_utf8(raw.bytes).map_err(|e| ParseError::Unreadable {
        expected: "UTF-8 text or PDF",
        detail: e.to_string(),
    })?;
    Ok(text.split('\u{c}').map(String::from).collect())
}

impl Iterator for DocumentEvents {
    type Item = AdapterEvent;

    fn next(&mut self) -> Option<AdapterEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some((page, line)) => self.visit_line(page, &line),
                None => {
                    self.close_current();
                    self.finished = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::IntermediateRecord;
    use crate::test_support::pdf_bytes;

    fn rule(kind: NodeKind, pattern: &str, id_scheme: IdScheme, parent: ParentRule) -> HeadingRule {
        HeadingRule::new(kind, Regex::new(pattern).unwrap(), id_scheme, parent)
    }

    fn outline_catalog() -> Catalog {
        Catalog {
            framework: Framework::RiskFunctions,
            rules: vec![
                rule(
                    NodeKind::Function,
                    r"^Part (?P<id>[A-Z]+): (?P<title>.+)$",
                    IdScheme::Verbatim,
                    ParentRule::Root,
                ),
                rule(
                    NodeKind::Category,
                    r"^Item (?P<id>[A-Z]+\.\d+)\s*(?P<title>.*)$",
                    IdScheme::Verbatim,
                    ParentRule::Prefix {
                        kind: NodeKind::Function,
                        delimiter: '.',
                    },
                )
                .with_marker(Regex::new(r"^Item\b").unwrap()),
                rule(
                    NodeKind::Subcategory,
                    r"^\((?P<id>\d+)\) (?P<title>.+)$",
                    IdScheme::QualifiedBy(NodeKind::Category),
                    ParentRule::Enclosing(NodeKind::Category),
                ),
            ],
            fields: vec![FieldRule {
                key: "owners",
                pattern: Regex::new(r"^Owners:\s*(?P<value>.+)$").unwrap(),
                list: true,
            }],
        }
    }

    fn parse(text: &str) -> Vec<AdapterEvent> {
        DocumentAdapter::new(outline_catalog())
            .parse(RawSource::new("memory:doc", text), &AdapterConfig::new("outline"))
            .collect()
    }

    fn unit(event: &AdapterEvent) -> &UnitRecord {
        match event {
            AdapterEvent::Record(IntermediateRecord::Unit(u)) => u,
            other => panic!("expected unit, got {:?}", other),
        }
    }

    fn link(event: &AdapterEvent) -> &LinkRecord {
        match event {
            AdapterEvent::Record(IntermediateRecord::Link(l)) => l,
            other => panic!("expected link, got {:?}", other),
        }
    }

    #[test]
    fn headings_segment_body_and_pages() {
        let events = parse("Preamble ignored\nPart A: Alpha\nfirst line\n\u{c}second line\nPart B: Beta\n");
        assert_eq!(events.len(), 2);

        let a = unit(&events[0]);
        assert_eq!(a.unit, UnitRef::of(NodeKind::Function, "A"));
        assert_eq!(a.name, "Alpha");
        assert_eq!(a.description, "first line second line");
        let citation = a.citation.as_ref().unwrap();
        assert_eq!(citation.location, "page 1");
        assert_eq!(citation.document_id, "outline");
        assert!(citation.excerpt.starts_with("Part A: Alpha"));

        let b = unit(&events[1]);
        assert_eq!(b.citation.as_ref().unwrap().location, "page 2");
    }

    #[test]
    fn prefix_and_enclosing_parents_become_part_of_links() {
        let events = parse("Part A: Alpha\nItem A.1 One\n(2) Two\n");
        assert_eq!(events.len(), 5);

        let item_link = link(&events[2]);
        assert_eq!(item_link.relation, Relation::PartOf);
        assert_eq!(item_link.source, UnitRef::of(NodeKind::Category, "A.1"));
        assert_eq!(item_link.target, UnitRef::of(NodeKind::Function, "A"));

        let sub = unit(&events[3]);
        assert_eq!(sub.unit.external_id, "A.1(2)");
        assert_eq!(link(&events[4]).target, UnitRef::of(NodeKind::Category, "A.1"));
    }

    #[test]
    fn prefix_parent_requires_earlier_unit() {
        let events = parse("Item Z.9 Orphan\n");
        assert_eq!(events.len(), 1);
        assert!(unit(&events[0]).unit.external_id == "Z.9");
    }

    #[test]
    fn malformed_heading_skips_and_discards_its_body() {
        let events = parse("Part A: Alpha\nalpha body\nItem without id\nstray body\nPart B: Beta\nbeta body\n");

        let a = unit(&events[0]);
        assert_eq!(a.description, "alpha body");
        assert!(matches!(
            events[1],
            AdapterEvent::Skipped(ParseError::MissingIdentifier {
                kind: NodeKind::Category,
                ..
            })
        ));
        let b = unit(&events[2]);
        assert_eq!(b.description, "beta body");
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn qualified_heading_outside_enclosing_unit_is_skipped() {
        let events = parse("(1) Lonely\n");
        assert!(matches!(events[0], AdapterEvent::Skipped(_)));
    }

    #[test]
    fn field_lines_become_properties() {
        let events = parse("Part A: Alpha\nOwners: CISO, Legal\ntext\n");
        let a = unit(&events[0]);
        assert_eq!(a.description, "text");
        assert_eq!(
            a.properties.get("owners"),
            Some(&vec!["CISO".to_string(), "Legal".to_string()].into())
        );
    }

    #[test]
    fn pdf_pages_become_page_locations() {
        let bytes = pdf_bytes(&[
            &["Part A: Alpha", "first line"],
            &["Part B: Beta", "Owners: CISO"],
        ]);
        let events: Vec<_> = DocumentAdapter::new(outline_catalog())
            .parse(RawSource::new("file:outline.pdf", bytes), &AdapterConfig::new("outline"))
            .collect();
        assert_eq!(events.len(), 2);

        let a = unit(&events[0]);
        assert_eq!(a.unit, UnitRef::of(NodeKind::Function, "A"));
        assert_eq!(a.name, "Alpha");
        assert_eq!(a.description, "first line");
        assert_eq!(a.citation.as_ref().unwrap().location, "page 1");

        let b = unit(&events[1]);
        assert_eq!(b.citation.as_ref().unwrap().location, "page 2");
        assert!(b.properties.get("owners").is_some());
    }

    #[test]
    fn page_limit_drops_later_pages() {
        let config = AdapterConfig::new("outline").with_page_limit(Some(1));
        let text: Vec<_> = DocumentAdapter::new(outline_catalog())
            .parse(RawSource::new("memory:doc", "Part A: Alpha\n\u{c}Part B: Beta\n"), &config)
            .collect();
        assert_eq!(text.len(), 1);

        let bytes = pdf_bytes(&[&["Part A: Alpha"], &["Part B: Beta"]]);
        let pdf: Vec<_> = DocumentAdapter::new(outline_catalog())
            .parse(RawSource::new("file:outline.pdf", bytes), &config)
            .collect();
        assert_eq!(pdf.len(), 1);
        assert_eq!(unit(&pdf[0]).unit.external_id, "A");
    }

    #[test]
    fn corrupt_pdf_is_a_single_skip() {
        let events: Vec<_> = DocumentAdapter::new(outline_catalog())
            .parse(
                RawSource::new("file:broken.pdf", "%PDF-1.7\n1 0 obj"),
                &AdapterConfig::new("outline"),
            )
            .collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            AdapterEvent::Skipped(ParseError::Unreadable { expected: "PDF", .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_a_single_skip() {
        let events: Vec<_> = DocumentAdapter::new(outline_catalog())
            .parse(
                RawSource::new("memory:bad", vec![0xff, 0xfe, 0x00]),
                &AdapterConfig::new("outline"),
            )
            .collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            AdapterEvent::Skipped(ParseError::Unreadable { .. })
        ));
    }
}
