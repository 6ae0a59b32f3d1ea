//! JSON-LD page interpreter
//!
//! Extracts:
//! - every `<script type="application/ld+json">` block in the document head
//! - optionally the `#__NEXT_DATA__` structured content blob
//! - the language switcher entries of the start page footer

use super::{InterpretError, PageInterpreter};
use crate::config::SiteConfig;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use url::Url;

const JSONLD_SELECTOR: &str = r#"head script[type="application/ld+json"]"#;
const NEXT_DATA_SELECTOR: &str = "#__NEXT_DATA__";
const LANGUAGE_ITEM_SELECTOR: &str = "footer li";
const LANGUAGE_BUTTON_SELECTOR: &str = "button[lang]";
const LANGUAGE_LABEL_SELECTOR: &str = "span";

/// Interpreter for listing pages that publish JSON-LD
#[derive(Debug, Clone, Default)]
pub struct JsonLdInterpreter {
    /// Also capture the `__NEXT_DATA__` blob
    pub include_next_data: bool,
}

impl JsonLdInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter that also captures the `__NEXT_DATA__` blob
    pub fn with_next_data() -> Self {
        Self {
            include_next_data: true,
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self {
            include_next_data: site.include_next_data,
        }
    }
}

impl PageInterpreter for JsonLdInterpreter {
    fn interpret(&self, body: &str, _url: &Url) -> Result<Value, InterpretError> {
        let document = Html::parse_document(body);

        let jsonld = extract_jsonld(&document)?;
        let mut content = json!({ "jsonld": jsonld });

        if self.include_next_data {
            content["next_data"] = extract_next_data(&document)?.unwrap_or(Value::Null);
        }

        Ok(content)
    }

    fn languages(&self, body: &str) -> Result<BTreeMap<String, String>, InterpretError> {
        let document = Html::parse_document(body);
        extract_languages(&document)
    }
}

fn selector(css: &str) -> Result<Selector, InterpretError> {
    Selector::parse(css).map_err(|e| InterpretError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Parses every JSON-LD block, in document order
fn extract_jsonld(document: &Html) -> Result<Vec<Value>, InterpretError> {
    let jsonld_selector = selector(JSONLD_SELECTOR)?;

    document
        .select(&jsonld_selector)
        .map(|element| {
            serde_json::from_str(element_text(&element).trim()).map_err(|source| {
                InterpretError::Json {
                    element: "application/ld+json".to_string(),
                    source,
                }
            })
        })
        .collect()
}

/// Parses the structured content blob; at most one is expected
fn extract_next_data(document: &Html) -> Result<Option<Value>, InterpretError> {
    let next_data_selector = selector(NEXT_DATA_SELECTOR)?;

    document
        .select(&next_data_selector)
        .next()
        .map(|element| {
            serde_json::from_str(element_text(&element).trim()).map_err(|source| {
                InterpretError::Json {
                    element: "__NEXT_DATA__".to_string(),
                    source,
                }
            })
        })
        .transpose()
}

/// Reads `lang id -> label` from the footer language switcher
///
/// Each entry is a list item holding a `<button lang="..">` whose second
/// `<span>` carries the display label. Ids are lower-cased.
fn extract_languages(document: &Html) -> Result<BTreeMap<String, String>, InterpretError> {
    let item_selector = selector(LANGUAGE_ITEM_SELECTOR)?;
    let button_selector = selector(LANGUAGE_BUTTON_SELECTOR)?;
    let label_selector = selector(LANGUAGE_LABEL_SELECTOR)?;

    let mut languages = BTreeMap::new();

    for item in document.select(&item_selector) {
        let Some(button) = item.select(&button_selector).next() else {
            continue;
        };
        let Some(lang_id) = button.value().attr("lang") else {
            continue;
        };

        let label = button
            .select(&label_selector)
            .nth(1)
            .map(|span| element_text(&span).trim().to_string())
            .ok_or_else(|| {
                InterpretError::MissingElement(format!("label span for language '{}'", lang_id))
            })?;

        languages.insert(lang_id.trim().to_lowercase(), label);
    }

    Ok(languages)
}
