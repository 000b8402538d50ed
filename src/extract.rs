//! Statute document loading and normalization.
//!
//! Source documents are `.docx` files (the corpus is a fixed set of
//! statute texts; other formats are out of scope). Extraction reads
//! `word/document.xml` from the ZIP container and collects the text runs
//! of each paragraph into a [`Block`]. [`light_clean`] then applies a
//! loss-free whitespace normalization that never reorders or drops
//! content, only collapses excess spacing.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// One non-empty paragraph of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub text: String,
    /// Zero-based paragraph position in the document.
    pub para_index: usize,
}

/// Load a `.docx` file into ordered paragraph blocks.
///
/// Empty paragraphs are skipped; `para_index` keeps the original
/// document position so block order is reconstructible.
pub fn load_docx(path: &Path) -> Result<Vec<Block>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    extract_docx_blocks(&bytes)
        .with_context(|| format!("Failed to extract document: {}", path.display()))
}

/// Join block texts with single newlines, preserving paragraph order.
pub fn blocks_to_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whitespace normalization safe for legal text: collapse runs of
/// spaces/tabs to one space, collapse 3+ newlines to a blank line, trim
/// the ends. Structure and wording are otherwise untouched.
pub fn light_clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_spaces = false;
    let mut newline_run = 0usize;

    for ch in text.chars() {
        match ch {
            ' ' | '\t' => {
                pending_spaces = true;
            }
            '\n' => {
                pending_spaces = false;
                newline_run += 1;
                if newline_run <= 2 {
                    out.push('\n');
                }
            }
            '\r' => {}
            _ => {
                if pending_spaces && !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                pending_spaces = false;
                newline_run = 0;
                out.push(ch);
            }
        }
    }

    out.trim().to_string()
}

fn extract_docx_blocks(bytes: &[u8]) -> Result<Vec<Block>> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).context("not a ZIP container")?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .context("word/document.xml not found")?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .context("failed to read word/document.xml")?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            bail!("word/document.xml exceeds size limit");
        }
    }

    parse_paragraphs(&doc_xml)
}

/// Walk `<w:p>` paragraphs, concatenating their `<w:t>` text runs.
fn parse_paragraphs(xml: &[u8]) -> Result<Vec<Block>> {
    use quick_xml::events::Event;

    let mut blocks = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut para_index = 0usize;
    let mut in_paragraph = false;
    let mut in_text_run = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" if in_paragraph => {
                    in_text_run = true;
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => {
                    in_text_run = false;
                }
                b"p" => {
                    if in_paragraph {
                        let text = current.trim();
                        if !text.is_empty() {
                            blocks.push(Block {
                                text: text.to_string(),
                                para_index,
                            });
                        }
                        para_index += 1;
                        in_paragraph = false;
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!("malformed document XML: {}", e),
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}
