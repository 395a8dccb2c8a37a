use crate::error::{Result, ScanError};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// Page-level metadata and the anchor hrefs in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub raw_hrefs: Vec<String>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<PageMetadata>;
}

impl<E: Extractor + ?Sized> Extractor for std::sync::Arc<E> {
    fn extract(&self, html: &str) -> Result<PageMetadata> {
        (**self).extract(html)
    }
}

/// `scraper`-backed extractor.
///
/// Only the first `<title>`, `meta[name=description]` and `meta[name=keywords]`
/// are consulted. A matching meta tag without a `content` attribute makes the
/// document unusable.
pub struct HtmlExtractor {
    title: Selector,
    description: Selector,
    keywords: Selector,
    anchors: Selector,
}

impl HtmlExtractor {
    pub fn new() -> Self {
        Self {
            title: Self::selector("title"),
            description: Self::selector(r#"meta[name="description"]"#),
            keywords: Self::selector(r#"meta[name="keywords"]"#),
            anchors: Self::selector("a[href]"),
        }
    }

    fn selector(css: &str) -> Selector {
        // Constant selectors; parse failure is a programming error.
        Selector::parse(css).unwrap()
    }

    fn meta_content(&self, document: &Html, selector: &Selector, name: &str) -> Result<Option<String>> {
        let Some(element) = document.select(selector).next() else {
            return Ok(None);
        };
        match element.value().attr("content") {
            Some(content) => Ok(Some(content.to_string())),
            None => Err(ScanError::Extraction {
                url: String::new(),
                reason: format!("meta {} tag has no content attribute", name),
            }),
        }
    }
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, html: &str) -> Result<PageMetadata> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(|element| element.text().collect::<String>());

        let description = self.meta_content(&document, &self.description, "description")?;

        let keywords = self
            .meta_content(&document, &self.keywords, "keywords")?
            .map(|content| content.split(',').map(|kw| kw.trim().to_string()).collect());

        let raw_hrefs = document
            .select(&self.anchors)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect();

        Ok(PageMetadata {
            title,
            description,
            keywords,
            raw_hrefs,
        })
    }
}
