//! URL handling module for the harvester
//!
//! This module provides pagination request building, redirect validation,
//! and seed key derivation.

mod compare;
mod pagination;

// Re-export main functions
pub use compare::{query_pairs, same_resource};
pub use pagination::{page_url, PAGE_PARAM};

use crate::{UrlError, UrlResult};
use url::Url;

/// Derives the stable archive key of a seed: its final non-empty path segment
///
/// # Examples
///
/// ```
/// use listing_harvester::url::seed_key;
/// use url::Url;
///
/// let url = Url::parse("https://www.example.com/review/shop.example.org").unwrap();
/// assert_eq!(seed_key(&url).unwrap(), "shop.example.org");
/// ```
pub fn seed_key(url: &Url) -> UrlResult<String> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .ok_or_else(|| UrlError::MissingSeedKey(url.to_string()))
}

/// Parses a URL string into a [`Url`], mapping failures to [`UrlError`]
pub fn parse(url_str: &str) -> UrlResult<Url> {
    Url::parse(url_str).map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))
}
