//! DOM-to-structured-text normalization.
//!
//! Converts a fetched page's raw markup into a clean sequence of typed
//! blocks (heading, paragraph, list item, quote), discarding boilerplate
//! regions. The walk starts at the first heading (falling back to
//! `article`/`main`, then `body`) and stops before the first `footer`.

use scraper::{ElementRef, Html};
use tracing::{debug, trace};

use moonscrape_shared::{Block, NormalizedDocument, RawDocument};

/// Tag names whose subtrees are discarded entirely before the walk.
pub const DEFAULT_BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "iframe", "button", "noscript",
    "meta", "link",
];

/// Soft-error phrases that mark a fetched page as unusable.
/// Matched case-insensitively as substrings of the whole body.
pub const DEFAULT_SOFT_ERROR_PHRASES: &[&str] = &[
    "technical difficulties",
    "please try again",
    "forbidden",
    "access denied",
    "unavailable",
    "error occurred",
    "we're sorry",
    "temporarily unavailable",
];

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Converts raw HTML into a [`NormalizedDocument`].
///
/// The boilerplate catalog and soft-error phrase list are injected at
/// construction so the normalizer can be tested in isolation.
pub struct Normalizer {
    boilerplate_tags: Vec<&'static str>,
    soft_error_phrases: Vec<&'static str>,
}

impl Normalizer {
    /// Create a normalizer with the default tag catalog and phrase list.
    pub fn new() -> Self {
        Self {
            boilerplate_tags: DEFAULT_BOILERPLATE_TAGS.to_vec(),
            soft_error_phrases: DEFAULT_SOFT_ERROR_PHRASES.to_vec(),
        }
    }

    /// Create a normalizer with a custom catalog (used by tests).
    pub fn with_catalog(
        boilerplate_tags: Vec<&'static str>,
        soft_error_phrases: Vec<&'static str>,
    ) -> Self {
        Self {
            boilerplate_tags,
            soft_error_phrases,
        }
    }

    /// Normalize a fetched document.
    ///
    /// Returns `None` when the document is unusable: a soft-error page, a
    /// page with no extractable root, or a page where no block survives
    /// classification. Per-node anomalies skip the node, never the
    /// document.
    pub fn normalize(&self, raw: &RawDocument) -> Option<NormalizedDocument> {
        if self.is_soft_error(&raw.body) {
            debug!(url = %raw.url, "soft-error page, discarding");
            return None;
        }

        let doc = Html::parse_document(&raw.body);

        let mut flat = Vec::new();
        collect_elements(&doc.root_element(), &self.boilerplate_tags, &mut flat);

        let start = find_start(&flat)?;

        // Truncate immediately before the first footer after the start.
        let end = flat[start..]
            .iter()
            .position(|item| matches!(item, FlatItem::Footer))
            .map(|offset| start + offset)
            .unwrap_or(flat.len());

        let mut blocks = Vec::new();
        for item in &flat[start..end] {
            let FlatItem::Element(el) = item else {
                continue;
            };
            if let Some(block) = classify(el) {
                blocks.push(block);
            }
        }

        let doc = NormalizedDocument {
            source_url: raw.url.clone(),
            blocks,
        };
        if doc.is_empty() {
            debug!(url = %raw.url, "no content blocks extracted");
            return None;
        }

        trace!(url = %raw.url, blocks = doc.blocks.len(), "normalized document");
        Some(doc)
    }

    fn is_soft_error(&self, body: &str) -> bool {
        let lowered = body.to_lowercase();
        self.soft_error_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Document flattening
// ---------------------------------------------------------------------------

/// A flattened document node: either a surviving element in reading order,
/// or the position of a removed `footer` subtree (kept as a truncation
/// marker).
enum FlatItem<'a> {
    Element(ElementRef<'a>),
    Footer,
}

/// Depth-first collection of elements in document order.
///
/// Boilerplate subtrees are dropped entirely (not just their text). A
/// `footer` subtree is also dropped, but its position is recorded so the
/// walk can truncate there.
fn collect_elements<'a>(
    el: &ElementRef<'a>,
    boilerplate: &[&str],
    out: &mut Vec<FlatItem<'a>>,
) {
    for child in el.children() {
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let tag = child_el.value().name();

        if tag == "footer" {
            out.push(FlatItem::Footer);
            continue;
        }
        if boilerplate.contains(&tag) {
            continue;
        }

        out.push(FlatItem::Element(child_el));
        collect_elements(&child_el, boilerplate, out);
    }
}

/// Find the index of the starting node: the first heading at any level,
/// else the first `article`/`main`, else `body`.
fn find_start(flat: &[FlatItem<'_>]) -> Option<usize> {
    let position_of = |pred: &dyn Fn(&str) -> bool| {
        flat.iter().position(|item| match item {
            FlatItem::Element(el) => pred(el.value().name()),
            FlatItem::Footer => false,
        })
    };

    position_of(&|tag| heading_level(tag).is_some())
        .or_else(|| position_of(&|tag| tag == "article" || tag == "main"))
        .or_else(|| position_of(&|tag| tag == "body"))
}

// ---------------------------------------------------------------------------
// Block classification
// ---------------------------------------------------------------------------

/// Classify a single element into a block, or `None` for non-content tags
/// and empty text.
fn classify(el: &ElementRef<'_>) -> Option<Block> {
    let tag = el.value().name();

    if let Some(level) = heading_level(tag) {
        let text = element_text(el)?;
        return Some(Block::Heading { level, text });
    }

    match tag {
        "p" => Some(Block::Paragraph(element_text(el)?)),
        "li" => {
            let text = element_text(el)?;
            Some(Block::ListItem {
                ordinal: list_ordinal(el),
                text,
            })
        }
        "blockquote" => Some(Block::Quote(element_text(el)?)),
        _ => None,
    }
}

/// Parse `h1`..`h6` into a level.
fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Whitespace-normalized text content of an element; `None` when empty.
fn element_text(el: &ElementRef<'_>) -> Option<String> {
    let text = el
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() { None } else { Some(text) }
}

/// Compute the ordinal of a list item.
///
/// Returns the 1-based position among the nearest enclosing list
/// container's direct items when that container is an ordered list;
/// `None` (bullet) for unordered lists and orphan items. Numbering
/// resets per list because each container counts only its own items.
fn list_ordinal(li: &ElementRef<'_>) -> Option<u32> {
    let container = enclosing_list(li)?;
    if container.value().name() != "ol" {
        return None;
    }

    let mut ordinal = 0u32;
    for child in container.children() {
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        if child_el.value().name() == "li" {
            ordinal += 1;
            if child_el.id() == li.id() {
                return Some(ordinal);
            }
        }
    }

    // Item nested deeper than a direct child; treat as bulleted.
    None
}

/// Nearest `ul`/`ol` ancestor of an element.
fn enclosing_list<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut current = el.parent();
    while let Some(node) = current {
        if let Some(parent_el) = ElementRef::wrap(node) {
            if matches!(parent_el.value().name(), "ul" | "ol") {
                return Some(parent_el);
            }
        }
        current = node.parent();
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use moonscrape_shared::Block;

    fn raw(body: &str) -> RawDocument {
        RawDocument {
            url: "https://example.com/page".into(),
            body: body.into(),
        }
    }

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }

    // --- Soft errors ---

    #[test]
    fn soft_error_page_is_rejected() {
        let normalizer = Normalizer::new();
        let html = "<html><body><h1>Oops</h1><p>Access Denied: you shall not pass</p></body></html>";
        assert!(normalizer.normalize(&raw(html)).is_none());
    }

    #[test]
    fn soft_error_match_is_case_insensitive() {
        let normalizer = Normalizer::new();
        let html =
            "<html><body><p>We are experiencing TECHNICAL DIFFICULTIES right now.</p></body></html>";
        assert!(normalizer.normalize(&raw(html)).is_none());
    }

    #[test]
    fn soft_error_overrides_other_content() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Perfectly Good Article</h1>
            <p>Lots of useful text here.</p>
            <p>This service is temporarily unavailable.</p>
        </body></html>"#;
        assert!(normalizer.normalize(&raw(html)).is_none());
    }

    // --- Start detection ---

    #[test]
    fn starts_at_first_heading() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <p>Preamble that comes before the first heading.</p>
            <h2>Section</h2>
            <p>Body text.</p>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        assert_eq!(
            doc.blocks[0],
            Block::Heading {
                level: 2,
                text: "Section".into()
            }
        );
        assert!(!doc.to_markdown().contains("Preamble"));
    }

    #[test]
    fn falls_back_to_article_without_heading() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <div><p>Outside the article.</p></div>
            <article><p>Inside the article.</p></article>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(md.contains("Inside the article."));
        assert!(!md.contains("Outside the article."));
    }

    #[test]
    fn falls_back_to_body_without_heading_or_article() {
        let normalizer = Normalizer::new();
        let html = "<html><body><p>Just a paragraph.</p></body></html>";
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        assert_eq!(doc.blocks, vec![Block::Paragraph("Just a paragraph.".into())]);
    }

    #[test]
    fn empty_document_yields_none() {
        let normalizer = Normalizer::new();
        assert!(normalizer.normalize(&raw("<html><body></body></html>")).is_none());
        assert!(normalizer.normalize(&raw("")).is_none());
    }

    #[test]
    fn whitespace_only_content_yields_none() {
        let normalizer = Normalizer::new();
        let html = "<html><body><p>   </p><div>\n\t</div></body></html>";
        assert!(normalizer.normalize(&raw(html)).is_none());
    }

    // --- Boilerplate removal ---

    #[test]
    fn boilerplate_subtrees_are_removed() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <nav><ul><li>Home</li><li>About</li></ul></nav>
            <header><h1>Site Banner</h1></header>
            <h1>Real Title</h1>
            <p>Real content.</p>
            <aside><p>Sidebar junk.</p></aside>
            <script>var tracking = true;</script>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(md.contains("Real Title"));
        assert!(md.contains("Real content."));
        assert!(!md.contains("Home"));
        assert!(!md.contains("Site Banner"));
        assert!(!md.contains("Sidebar junk"));
        assert!(!md.contains("tracking"));
    }

    #[test]
    fn heading_inside_header_does_not_start_the_walk() {
        // The banner h1 lives in a removed subtree, so the walk must start
        // at the first surviving heading.
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <header><h1>Banner</h1></header>
            <h2>Actual Start</h2>
            <p>Text.</p>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        assert_eq!(
            doc.blocks[0],
            Block::Heading {
                level: 2,
                text: "Actual Start".into()
            }
        );
    }

    // --- Footer truncation ---

    #[test]
    fn footer_truncates_remaining_content() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Title</h1>
            <p>Kept.</p>
            <footer><p>Copyright 2025</p></footer>
            <p>After the footer, also dropped.</p>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(md.contains("Kept."));
        assert!(!md.contains("Copyright"));
        assert!(!md.contains("After the footer"));
    }

    #[test]
    fn heading_and_paragraph_render_before_footer() {
        let normalizer = Normalizer::new();
        let html = "<html><body><h1>T</h1><p>Hello world</p><footer>x</footer></body></html>";
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        assert_eq!(doc.to_markdown(), "# T\n\nHello world");
    }

    #[test]
    fn single_paragraph_roundtrip() {
        let normalizer = Normalizer::new();
        let html = "<html><body><p>The quick brown fox.</p></body></html>";
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph("The quick brown fox.".into())]
        );
    }

    // --- Lists ---

    #[test]
    fn ordered_list_items_are_numbered() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Steps</h1>
            <ol><li>alpha</li><li>beta</li><li>gamma</li></ol>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(md.contains("1. alpha"));
        assert!(md.contains("2. beta"));
        assert!(md.contains("3. gamma"));
    }

    #[test]
    fn unordered_list_never_produces_numbers() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Points</h1>
            <ul><li>one</li><li>two</li></ul>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(md.contains("- one"));
        assert!(md.contains("- two"));
        assert!(!md.contains("1."));
    }

    #[test]
    fn ordinals_reset_per_list() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Two Lists</h1>
            <ol><li>a</li><li>b</li></ol>
            <p>Between.</p>
            <ol><li>c</li></ol>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let ordinals: Vec<Option<u32>> = doc
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::ListItem { ordinal, .. } => Some(*ordinal),
                _ => None,
            })
            .collect();
        assert_eq!(ordinals, vec![Some(1), Some(2), Some(1)]);
    }

    #[test]
    fn mixed_lists_keep_their_own_markers() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Mixed</h1>
            <ul><li>bullet</li></ul>
            <ol><li>numbered</li></ol>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(md.contains("- bullet"));
        assert!(md.contains("1. numbered"));
    }

    // --- Output shape ---

    #[test]
    fn output_never_has_double_blank_lines() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Heading</h1>
            <div><div><p>Deeply nested.</p></div></div>
            <blockquote>Quoted words.</blockquote>
            <h3>Sub</h3>
            <p>More.</p>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        let md = doc.to_markdown();
        assert!(!md.contains("\n\n\n"));
        assert_eq!(md, md.trim());
        assert!(md.contains("> Quoted words."));
        assert!(md.contains("### Sub"));
    }

    #[test]
    fn empty_nodes_are_skipped_not_fatal() {
        let normalizer = Normalizer::new();
        let html = r#"<html><body>
            <h1>Title</h1>
            <p></p>
            <p>Survivor.</p>
            <li></li>
        </body></html>"#;
        let doc = normalizer.normalize(&raw(html)).expect("normalized");
        assert_eq!(doc.blocks.len(), 2);
    }

    // --- Fixture ---

    #[test]
    fn article_fixture_normalizes() {
        let normalizer = Normalizer::new();
        let html = fixture("html/article.html");
        let doc = normalizer
            .normalize(&RawDocument {
                url: "https://news.example.com/quantum".into(),
                body: html,
            })
            .expect("normalized");

        let md = doc.to_markdown();
        // Starts at the article's first real heading
        assert!(md.starts_with("# Quantum Computing Milestone"));
        // Keeps body structure
        assert!(md.contains("## How It Works"));
        assert!(md.contains("1. Cool the processor"));
        assert!(md.contains("- Cryptography"));
        assert!(md.contains("> We believe this changes everything,"));
        // Drops chrome and footer
        assert!(!md.contains("Subscribe"));
        assert!(!md.contains("All rights reserved"));
        assert!(!md.contains("cookie"));
    }

    #[test]
    fn soft_error_fixture_rejected() {
        let normalizer = Normalizer::new();
        let html = fixture("html/softerror.html");
        let result = normalizer.normalize(&RawDocument {
            url: "https://blocked.example.com/".into(),
            body: html,
        });
        assert!(result.is_none());
    }

    // --- Catalog injection ---

    #[test]
    fn custom_catalog_is_honored() {
        let normalizer = Normalizer::with_catalog(vec!["script"], vec!["llama outbreak"]);
        // "access denied" is not in the custom phrase list, so it passes
        let html = "<html><body><p>access denied? no, content</p></body></html>";
        assert!(normalizer.normalize(&raw(html)).is_some());

        let html = "<html><body><p>breaking: llama outbreak downtown</p></body></html>";
        assert!(normalizer.normalize(&raw(html)).is_none());
    }
}
