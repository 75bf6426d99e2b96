//! Text extraction for each supported format

use pulldown_cmark::{Event, Parser, TagEnd};

use crate::error::{Error, Result};
use crate::types::FileType;

/// Multi-format document parser
pub struct DocumentParser;

impl DocumentParser {
    /// Extract plain text from raw bytes of the given type
    ///
    /// PDF extraction is CPU-bound; callers on the async runtime should run
    /// this inside `spawn_blocking`.
    pub fn parse(source_name: &str, data: &[u8], file_type: FileType) -> Result<String> {
        let text = match file_type {
            FileType::Pdf => Self::parse_pdf(source_name, data)?,
            FileType::Markdown => Self::parse_markdown(data),
            FileType::Html => Self::parse_html(source_name, data)?,
            FileType::Text => String::from_utf8_lossy(data).into_owned(),
        };
        Ok(text)
    }

    fn parse_pdf(source_name: &str, data: &[u8]) -> Result<String> {
        // pdf-extract panics on some malformed fonts
        extract_catching_panics(source_name, || pdf_extract::extract_text_from_mem(data))
    }

    /// Render markdown to plain text, keeping block boundaries as blank lines
    fn parse_markdown(data: &[u8]) -> String {
        let raw = String::from_utf8_lossy(data);
        let mut out = String::with_capacity(raw.len());

        for event in Parser::new(&raw) {
            match event {
                Event::Text(text) | Event::Code(text) => out.push_str(&text),
                Event::SoftBreak => out.push(' '),
                Event::HardBreak => out.push('\n'),
                Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Heading(_))
                | Event::End(TagEnd::CodeBlock) => out.push_str("\n\n"),
                Event::End(TagEnd::Item) => out.push('\n'),
                _ => {}
            }
        }

        out.trim().to_string()
    }

    /// Visible text of the `<body>`, one text run per line
    fn parse_html(source_name: &str, data: &[u8]) -> Result<String> {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);
        let body_selector = scraper::Selector::parse("body")
            .map_err(|e| Error::file_parse(source_name, format!("bad selector: {:?}", e)))?;

        let mut content = String::new();
        let Some(body) = document.select(&body_selector).next() else {
            return Ok(content);
        };

        for node in body.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()))
                .map(|name| matches!(name, "script" | "style" | "noscript"))
                .unwrap_or(false);
            if hidden {
                continue;
            }

            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(trimmed);
            }
        }

        Ok(content)
    }
}

/// Run an extractor, turning both its errors and its panics into `FileParse`
///
/// Requires `panic = "unwind"` in every profile the server ships with.
fn extract_catching_panics<F, E>(source_name: &str, extract: F) -> Result<String>
where
    F: FnOnce() -> std::result::Result<String, E> + std::panic::UnwindSafe,
    E: std::fmt::Display,
{
    match std::panic::catch_unwind(extract) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(Error::file_parse(source_name, e.to_string())),
        Err(_) => Err(Error::file_parse(source_name, "PDF extractor crashed")),
    }
}
