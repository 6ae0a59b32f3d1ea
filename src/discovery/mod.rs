//! Seed discovery from a two-level sitemap index
//!
//! Discovery runs in three steps:
//! 1. fetch the start page and read the supported languages from it
//! 2. per language, fetch `index_{language}.xml` and list its sub-sitemaps
//! 3. per sub-sitemap, collect every URL carrying a seed marker
//!
//! Discovery is all-or-nothing: the first failing fetch or parse aborts the
//! whole run so a partial seed set is never checkpointed.

pub mod sitemap;

pub use sitemap::{parse_sitemap_index, parse_urlset, SitemapError, SITEMAP_NAMESPACE};

use crate::config::SiteConfig;
use crate::crawler::Fetcher;
use crate::interpret::PageInterpreter;
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Drops repeated seed URLs, keeping the first occurrence and its `lastmod`
pub fn dedup_seeds(seeds: impl IntoIterator<Item = SeedUrl>) -> Vec<SeedUrl> {
    let mut seen = HashSet::new();
    seeds
        .into_iter()
        .filter(|seed| seen.insert(seed.url.clone()))
        .collect()
}

/// A discovered pagination root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUrl {
    pub url: String,
    /// `lastmod` of the sitemap entry, verbatim
    #[serde(alias = "last_mod", default)]
    pub last_modified: Option<String>,
}

/// Per-language summary kept for observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageOverview {
    pub language_id: String,
    pub label: String,
    pub seed_count: usize,
}

/// Everything discovery produces; the unit a checkpoint persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    /// language id -> display label
    pub available_languages: BTreeMap<String, String>,
    pub language_overview: Vec<LanguageOverview>,
    /// language id -> seeds in discovery order
    pub language_seed_urls: BTreeMap<String, Vec<SeedUrl>>,
}

impl DiscoverySnapshot {
    /// Seeds discovered for `language_id`
    pub fn seeds(&self, language_id: &str) -> Option<&[SeedUrl]> {
        self.language_seed_urls.get(language_id).map(Vec::as_slice)
    }

    /// Seeds for `language_id`, or [`HarvestError::UnknownLanguage`]
    pub fn require_seeds(&self, language_id: &str) -> Result<&[SeedUrl]> {
        self.seeds(language_id)
            .ok_or_else(|| HarvestError::UnknownLanguage(language_id.to_string()))
    }

    pub fn total_seeds(&self) -> usize {
        self.language_seed_urls.values().map(Vec::len).sum()
    }
}

/// Walks the sitemap hierarchy of one site
pub struct SeedDiscovery<'a, I: PageInterpreter + ?Sized> {
    fetcher: &'a Fetcher,
    interpreter: &'a I,
    site: &'a SiteConfig,
}

impl<'a, I: PageInterpreter + ?Sized> SeedDiscovery<'a, I> {
    pub fn new(fetcher: &'a Fetcher, interpreter: &'a I, site: &'a SiteConfig) -> Self {
        Self {
            fetcher,
            interpreter,
            site,
        }
    }

    /// Runs the full discovery for every language on the start page
    pub async fn discover(&self) -> Result<DiscoverySnapshot> {
        let available_languages = self.discover_languages().await?;

        let mut snapshot = DiscoverySnapshot {
            available_languages: available_languages.clone(),
            ..Default::default()
        };

        for (index, (language_id, label)) in available_languages.iter().enumerate() {
            tracing::info!(
                "Discovering seeds for '{}' ({}/{})",
                language_id,
                index + 1,
                available_languages.len()
            );

            let seeds = self.discover_language(language_id).await?;

            snapshot.language_overview.push(LanguageOverview {
                language_id: language_id.clone(),
                label: label.clone(),
                seed_count: seeds.len(),
            });
            snapshot
                .language_seed_urls
                .insert(language_id.clone(), seeds);
        }

        tracing::info!(
            "Seed urls for {} languages discovered ({} seeds)",
            snapshot.language_overview.len(),
            snapshot.total_seeds()
        );

        Ok(snapshot)
    }

    /// Step 1: reads the language switcher of the start page
    pub async fn discover_languages(&self) -> Result<BTreeMap<String, String>> {
        let url = parse_url(&self.site.start_page_url)?;
        let page = self.fetch(&url).await?;

        let languages = self
            .interpreter
            .languages(&page.body)
            .map_err(|e| discovery_error(&url, e))?;

        if languages.is_empty() {
            return Err(discovery_error(&url, "no languages found on start page"));
        }

        tracing::info!("{} available languages found on start page", languages.len());
        Ok(languages)
    }

    /// Steps 2 and 3 for one language
    pub async fn discover_language(&self, language_id: &str) -> Result<Vec<SeedUrl>> {
        let index_url = parse_url(&self.site.sitemap_index_url(language_id))?;
        let index = self.fetch(&index_url).await?;

        let sitemap_urls =
            parse_sitemap_index(&index.body).map_err(|e| discovery_error(&index_url, e))?;
        tracing::debug!(
            "{} sub-sitemaps listed in {}",
            sitemap_urls.len(),
            index_url
        );

        let mut seeds = Vec::new();
        for loc in &sitemap_urls {
            let sitemap_url = index_url
                .join(loc)
                .map_err(|e| discovery_error(&index_url, format!("invalid <loc> {}: {}", loc, e)))?;

            let sitemap = self.fetch(&sitemap_url).await?;
            let found = parse_urlset(&sitemap.body, &self.site.seed_markers)
                .map_err(|e| discovery_error(&sitemap_url, e))?;

            tracing::debug!("{} seeds in {}", found.len(), sitemap_url);
            seeds.extend(found);
        }

        let listed = seeds.len();
        let seeds = dedup_seeds(seeds);
        if seeds.len() < listed {
            tracing::debug!(
                "{} repeated seed URLs dropped for '{}'",
                listed - seeds.len(),
                language_id
            );
        }

        Ok(seeds)
    }

    async fn fetch(&self, url: &Url) -> Result<crate::crawler::FetchedPage> {
        self.fetcher
            .fetch_document(url)
            .await
            .map_err(|e| discovery_error(url, e))
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| HarvestError::Discovery {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn discovery_error(url: &Url, cause: impl std::fmt::Display) -> HarvestError {
    HarvestError::Discovery {
        url: url.to_string(),
        message: cause.to_string(),
    }
}
