//! Boundary to the feed format parser.
//!
//! The rest of the pipeline only sees [`ParsedFeed`]; format detection for
//! RSS, Atom and JSON Feed is delegated to `feed-rs`.

use chrono::{DateTime, Utc};
use feed_rs::parser;
use html_escape::decode_html_entities;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("feed parsing error: {0}")]
pub struct ParseError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub entries: Vec<RawEntry>,
}

/// One upstream entry, in document order. Missing fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub content: String,
    pub description: String,
    pub link: String,
    pub guid: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

pub trait FeedParser {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, ParseError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedRsParser;

impl FeedRsParser {
    pub fn new() -> Self {
        Self
    }
}

impl FeedParser for FeedRsParser {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, ParseError> {
        // Entries without an upstream id keep an empty guid.
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(body)
            .map_err(|e| ParseError(e.to_string()))?;

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| {
                let image_url = entry
                    .media
                    .iter()
                    .flat_map(|m| m.thumbnails.iter())
                    .map(|t| t.image.uri.clone())
                    .next()
                    .or_else(|| {
                        entry
                            .media
                            .iter()
                            .flat_map(|m| m.content.iter())
                            .filter(|c| {
                                c.content_type
                                    .as_ref()
                                    .is_some_and(|t| t.ty().as_str() == "image")
                            })
                            .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
                    });

                RawEntry {
                    title: entry
                        .title
                        .map(|t| decode_html_entities(&t.content).to_string())
                        .unwrap_or_default(),
                    content: entry.content.and_then(|c| c.body).unwrap_or_default(),
                    description: entry.summary.map(|s| s.content).unwrap_or_default(),
                    link: entry
                        .links
                        .first()
                        .map(|l| l.href.clone())
                        .unwrap_or_default(),
                    guid: entry.id,
                    // Publish time only; `updated` moves when an entry is edited.
                    published_at: entry.published,
                    image_url,
                }
            })
            .collect();

        Ok(ParsedFeed {
            title: feed
                .title
                .map(|t| decode_html_entities(&t.content).to_string())
                .unwrap_or_default(),
            updated_at: feed.updated,
            entries,
        })
    }
}
