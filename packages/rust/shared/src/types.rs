//! Core domain types for MoonScrape documents.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawDocument
// ---------------------------------------------------------------------------

/// A fetched page as decoded text, before normalization.
///
/// Produced by the fetch layer (which handles charset decoding), consumed
/// once by the normalizer, then discarded.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Source URL the content was fetched from.
    pub url: String,
    /// Decoded page body.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A typed unit of normalized content, in document reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    /// A heading with its level (1–6).
    Heading { level: u8, text: String },
    /// A plain paragraph.
    Paragraph(String),
    /// A list item. `ordinal` is `Some(n)` for the n-th item of an ordered
    /// list, `None` for a bulleted item.
    ListItem { ordinal: Option<u32>, text: String },
    /// A block quotation.
    Quote(String),
}

impl Block {
    /// Render this block as a markdown line (without surrounding blank lines).
    pub fn to_markdown(&self) -> String {
        match self {
            Block::Heading { level, text } => {
                format!("{} {text}", "#".repeat(usize::from(*level)))
            }
            Block::Paragraph(text) => text.clone(),
            Block::ListItem {
                ordinal: Some(n),
                text,
            } => format!("{n}. {text}"),
            Block::ListItem {
                ordinal: None,
                text,
            } => format!("- {text}"),
            Block::Quote(text) => format!("> {text}"),
        }
    }

    fn is_list_item(&self) -> bool {
        matches!(self, Block::ListItem { .. })
    }
}

// ---------------------------------------------------------------------------
// NormalizedDocument
// ---------------------------------------------------------------------------

/// Boilerplate-free, structured representation of a page's readable content.
///
/// Invariants: blocks never carry empty text, and no block originates from
/// script/style/navigation/form boilerplate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Source URL of the original page.
    pub source_url: String,
    /// Blocks in document reading order.
    pub blocks: Vec<Block>,
}

impl NormalizedDocument {
    /// Serialize the document to markdown text.
    ///
    /// Blocks are separated by one blank line; consecutive list items stay
    /// on adjacent lines. Output is trimmed and never contains more than
    /// one consecutive blank line.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                let prev_is_item = self.blocks[i - 1].is_list_item();
                if prev_is_item && block.is_list_item() {
                    out.push('\n');
                } else {
                    out.push_str("\n\n");
                }
            }
            out.push_str(&block.to_markdown());
        }

        out.trim().to_string()
    }

    /// Whether the document carries any content at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
