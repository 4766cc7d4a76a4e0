//! Scripted collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::fetcher::{FetchError, Fetcher};

/// RSS 2.0 document with one dated entry per slug.
pub fn rss_document(title: &str, slugs: &[&str]) -> Vec<u8> {
    let items: String = slugs
        .iter()
        .enumerate()
        .map(|(i, slug)| {
            format!(
                "<item><title>Entry {slug}</title><link>https://example.test/{slug}</link>\
                 <guid>{slug}</guid><pubDate>Mon, 0{day} Jan 2024 00:00:00 GMT</pubDate>\
                 <description>About {slug}</description></item>",
                slug = slug,
                day = (i % 9) + 1
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>{}</title><lastBuildDate>Wed, 10 Jan 2024 00:00:00 GMT</lastBuildDate>{}</channel></rss>"#,
        title, items
    )
    .into_bytes()
}

/// Fetcher returning canned responses per URL, with optional latency.
/// Tracks call counts and the peak number of overlapping calls.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, url: &str, response: Result<Vec<u8>, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::BadStatus(404)));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}
