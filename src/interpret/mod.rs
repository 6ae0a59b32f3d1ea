//! Page interpretation
//!
//! The frontier and discovery never look inside a page body themselves; they
//! hand it to a [`PageInterpreter`]. Callers may plug in their own, the crate
//! ships [`JsonLdInterpreter`] for listing sites that publish JSON-LD.

mod jsonld;

pub use jsonld::JsonLdInterpreter;

use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Errors raised while interpreting a page body
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Malformed JSON in {element}: {source}")]
    Json {
        element: String,
        source: serde_json::Error,
    },

    #[error("Missing element: {0}")]
    MissingElement(String),
}

/// Converts fetched page bodies into domain records
pub trait PageInterpreter {
    /// Interprets one listing page into a structured record
    fn interpret(&self, body: &str, url: &Url) -> Result<serde_json::Value, InterpretError>;

    /// Extracts `language id -> display label` from the site's start page
    fn languages(&self, body: &str) -> Result<BTreeMap<String, String>, InterpretError>;
}
