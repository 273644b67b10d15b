//! RDF catalog metadata extraction
//!
//! Gutenberg publishes one RDF/XML record per book. Only three fields are
//! needed, so they are pulled out with patterns instead of a full RDF parse.

use gutenload_common::{default_title, ItemId, DEFAULT_AUTHOR, DEFAULT_LANGUAGE_CODE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Title, author and language of one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub language_code: String,
}

impl BookMetadata {
    /// Fallback values used when the catalog record is missing or unusable
    pub fn defaults(id: ItemId) -> Self {
        Self {
            title: default_title(id),
            author: DEFAULT_AUTHOR.to_string(),
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
        }
    }
}

/// Compiled extraction patterns, built once per fetcher
#[derive(Debug, Clone)]
pub struct RdfParser {
    title: Regex,
    author: Regex,
    language: Regex,
}

impl RdfParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            title: Regex::new(r"(?s)<dcterms:title[^>]*>(.*?)</dcterms:title>")?,
            author: Regex::new(r"(?s)<pgterms:name[^>]*>(.*?)</pgterms:name>")?,
            language: Regex::new(r"<rdf:value[^>]*>([a-z]{2,3})</rdf:value>")?,
        })
    }

    /// Extract metadata from an RDF document.
    ///
    /// A document without a title element is treated as unusable and yields
    /// the defaults. Individual missing fields fall back one by one.
    pub fn parse(&self, id: ItemId, rdf: &str) -> BookMetadata {
        let mut metadata = BookMetadata::defaults(id);

        let Some(title) = capture(&self.title, rdf) else {
            return metadata;
        };
        if !title.is_empty() {
            metadata.title = title;
        }

        if let Some(author) = capture(&self.author, rdf).filter(|a| !a.is_empty()) {
            metadata.author = author;
        }

        if let Some(code) = self.language.captures(rdf).and_then(|c| c.get(1)) {
            metadata.language_code = code.as_str().chars().take(2).collect();
        }

        metadata
    }
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    let raw = pattern.captures(haystack)?.get(1)?.as_str();
    Some(normalize(&unescape(raw)))
}

fn unescape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Collapse the line breaks RDF titles often carry
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
