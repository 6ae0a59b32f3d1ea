//! Sitemap protocol parsing
//!
//! Handles the two document kinds of the sitemap protocol:
//! - `<sitemapindex>`: references sub-sitemaps under `sitemap/loc`
//! - `<urlset>`: lists concrete URLs under `url/loc` with optional `url/lastmod`
//!
//! Elements are matched by local name within the sitemap namespace, so
//! prefixed documents parse the same as default-namespace ones.

use super::SeedUrl;
use roxmltree::{Document, Node};
use thiserror::Error;

/// Namespace every sitemap document must declare on its root element
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Errors raised while parsing a sitemap document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SitemapError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Missing <{0}> root element")]
    MissingRoot(&'static str),

    #[error("Unexpected namespace on <{root}>: {found:?}")]
    Namespace {
        root: &'static str,
        found: Option<String>,
    },

    #[error("Entry without <loc> in <{0}>")]
    MissingLoc(&'static str),
}

/// `node` is a sitemap-namespace element called `name`
fn is_sitemap_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(SITEMAP_NAMESPACE)
}

/// Checks the root element's name and namespace
fn root<'a, 'input>(
    document: &'a Document<'input>,
    name: &'static str,
) -> Result<Node<'a, 'input>, SitemapError> {
    let root = document.root_element();
    if root.tag_name().name() != name {
        return Err(SitemapError::MissingRoot(name));
    }

    match root.tag_name().namespace() {
        Some(SITEMAP_NAMESPACE) => Ok(root),
        found => Err(SitemapError::Namespace {
            root: name,
            found: found.map(str::to_string),
        }),
    }
}

/// Direct children of `parent` that are sitemap elements called `name`
fn children<'a, 'input: 'a>(
    parent: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    parent
        .children()
        .filter(move |node| is_sitemap_element(node, name))
}

/// Text of the first direct child called `name`, trimmed; `None` when absent or blank
///
/// Text and CDATA sections are concatenated.
fn child_text(parent: Node<'_, '_>, name: &'static str) -> Option<String> {
    children(parent, name)
        .next()
        .map(|child| {
            child
                .descendants()
                .filter(Node::is_text)
                .filter_map(|text| text.text())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|text| !text.is_empty())
}

fn parse(xml: &str) -> Result<Document<'_>, SitemapError> {
    Document::parse(xml).map_err(|e| SitemapError::Malformed(e.to_string()))
}

/// Extracts the sub-sitemap locations listed in a sitemap index
pub fn parse_sitemap_index(xml: &str) -> Result<Vec<String>, SitemapError> {
    let document = parse(xml)?;
    let root = root(&document, "sitemapindex")?;

    children(root, "sitemap")
        .map(|entry| child_text(entry, "loc").ok_or(SitemapError::MissingLoc("sitemap")))
        .collect()
}

/// Extracts the URLs of a urlset whose location contains any of `markers`
///
/// `lastmod` is kept verbatim; document order is preserved.
pub fn parse_urlset(xml: &str, markers: &[String]) -> Result<Vec<SeedUrl>, SitemapError> {
    let document = parse(xml)?;
    let root = root(&document, "urlset")?;

    let mut seeds = Vec::new();
    for entry in children(root, "url") {
        let loc = child_text(entry, "loc").ok_or(SitemapError::MissingLoc("url"))?;

        if markers.iter().any(|marker| loc.contains(marker.as_str())) {
            seeds.push(SeedUrl {
                url: loc,
                last_modified: child_text(entry, "lastmod"),
            });
        }
    }

    Ok(seeds)
}
