//! Content-addressed identities for feeds and items.
//!
//! Identities are hex-encoded SHA-256 digests of a seed string, so the same
//! upstream source or entry always maps to the same row, across fetches and
//! across process restarts.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use url::Url;

use crate::app::Result;

/// Hash an arbitrary seed into a 64-char lowercase hex identity.
pub fn hash(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a feed link so trivially different spellings share one identity
/// (scheme and host case, default port, empty path).
pub fn canonical_link(link: &str) -> Result<String> {
    let url = Url::parse(link.trim())?;
    Ok(url.to_string())
}

/// Feed identity: hash of the canonical source URL.
pub fn feed_id(link: &str) -> Result<String> {
    Ok(hash(&canonical_link(link)?))
}

/// Item identity, scoped to its feed.
///
/// Keyed on `(link, published)`. Entries without a publish time fall back to
/// `(title, link)`.
pub fn item_id(
    feed_id: &str,
    link: &str,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    let seed = match published {
        Some(at) => format!(
            "{}\n{}\n{}",
            feed_id,
            link,
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        None => format!("{}\n{}\n{}", feed_id, title, link),
    };
    hash(&seed)
}
