use scraper::{Html, Selector};
use url::Url;

use harvest_core::error::AppError;
use harvest_core::traits::LinkExtractor;

/// Anchor href extraction backed by the `scraper` HTML parser.
///
/// Relative hrefs are resolved against the page URL; fragments are
/// stripped so `/page#a` and `/page#b` dedup to one URL. Non-http(s)
/// schemes (mailto:, javascript:, tel:) are dropped.
#[derive(Clone, Default)]
pub struct ScraperLinkExtractor;

impl ScraperLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for ScraperLinkExtractor {
    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<String>, AppError> {
        let base = Url::parse(base_url)
            .map_err(|e| AppError::ValidationError(format!("Invalid base URL '{base_url}': {e}")))?;
        // The selector literal is valid; parse cannot fail here.
        let selector = Selector::parse("a[href]")
            .map_err(|e| AppError::Generic(format!("Selector parse failed: {e}")))?;

        let document = Html::parse_document(html);
        let mut seen = std::collections::HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(mut resolved) = base.join(href.trim()) else {
                tracing::debug!(href, "Skipping unresolvable href");
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            resolved.set_fragment(None);
            let url = resolved.to_string();
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }

        Ok(links)
    }
}
