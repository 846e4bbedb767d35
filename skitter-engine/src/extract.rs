use crate::error::ParseError;
use scraper::{Html, Selector};
use url::Url;

/// Extracted view of one fetched document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub title: String,
    pub content: String,
    /// Absolute URLs in document order. May contain duplicates and
    /// off-domain hosts; the frontier filters both.
    pub links: Vec<String>,
}

/// Turns a fetched body into title, text content, and outbound links.
///
/// A failure here never aborts a crawl: the frontier records the page
/// with empty content and zero links and keeps going.
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, base_url: &str) -> std::result::Result<Extraction, ParseError>;
}

/// Default extractor: `<title>` text, paragraph text joined with
/// newlines, and `a[href]` targets resolved against the page URL.
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, body: &str, base_url: &str) -> std::result::Result<Extraction, ParseError> {
        let base = Url::parse(base_url)
            .map_err(|e| ParseError(format!("unusable page URL {}: {}", base_url, e)))?;

        let document = Html::parse_document(body);

        let title_selector = Selector::parse("title").unwrap();
        let title = document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let paragraph_selector = Selector::parse("p").unwrap();
        let content = document
            .select(&paragraph_selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let link_selector = Selector::parse("a[href]").unwrap();
        let mut links = Vec::new();
        for element in document.select(&link_selector) {
            if let Some(href) = element.value().attr("href")
                && let Some(absolute) = resolve_link(&base, href)
            {
                links.push(absolute);
            }
        }

        Ok(Extraction {
            title,
            content,
            links,
        })
    }
}

/// Resolves `href` against `base`, skipping non-navigable schemes and
/// bare fragments. Fragments are stripped from the result.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
