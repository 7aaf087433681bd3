use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Fetches rendered page content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Extracts outbound links from page content, resolved to absolute URLs.
///
/// Pure with respect to the network: implementations parse the given
/// content only. Invalid or non-http(s) hrefs are dropped silently.
pub trait LinkExtractor: Send + Sync + Clone {
    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<String>, AppError>;
}

/// How the semantic extractor labeled a discovered link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkLabel {
    /// A page expected to link onward to further pages or documents.
    Seed,
    /// The document itself.
    Target,
}

/// A link labeled by the semantic extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledLink {
    pub url: String,
    pub label: LinkLabel,
}

impl LabeledLink {
    pub fn new(url: impl Into<String>, label: LinkLabel) -> Self {
        Self {
            url: url.into(),
            label,
        }
    }
}

/// AI-assisted link labeling for pages where regex patterns fall short
/// (types 3 and 4). Treated as unreliable I/O: failures follow the same
/// retry/fail policy as fetch failures.
pub trait SemanticExtractor: Send + Sync + Clone {
    fn label_links(
        &self,
        content: &str,
        base_url: &str,
    ) -> impl Future<Output = Result<Vec<LabeledLink>, AppError>> + Send;
}
