//! Link canonicalization for a single page.
//!
//! Hrefs go through [`rewrite_fragment`], then [`resolve`] against the page
//! URL, in document order, and the result is passed through [`dedupe`].

use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Query marker used by the escaped-fragment crawling convention.
pub const ESCAPED_FRAGMENT: &str = "?_escaped_fragment_=";

const HASHBANG: &str = "#!";

/// Rewrites `#!` hash routes into `?_escaped_fragment_=` form.
///
/// Returns `None` for pure in-page anchors (`#top`), which are not links.
pub fn rewrite_fragment(href: &str) -> Option<String> {
    if let Some(route) = href.strip_prefix(HASHBANG) {
        return Some(format!("{}{}", ESCAPED_FRAGMENT, route));
    }
    if href.starts_with('#') {
        return None;
    }
    if href.contains(HASHBANG) {
        return Some(href.replace(HASHBANG, ESCAPED_FRAGMENT));
    }
    Some(href.to_string())
}

/// RFC 3986 reference resolution of `href` against `base`.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    match base.join(href) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            debug!("Failed to join '{}' with base '{}': {}", href, base, e);
            None
        }
    }
}

/// Drops repeated elements, keeping each first occurrence in place.
pub fn dedupe<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        let item = item.into();
        if seen.insert(item.clone()) {
            unique.push(item);
        }
    }
    unique
}

/// Turns the raw hrefs of the page at `base` into its outbound URL list.
pub fn normalize_links<S: AsRef<str>>(base: &Url, hrefs: &[S]) -> Vec<String> {
    let resolved: Vec<String> = hrefs
        .iter()
        .filter_map(|href| rewrite_fragment(href.as_ref()))
        .filter_map(|href| resolve(base, &href))
        .collect();

    let skipped = hrefs.len() - resolved.len();
    if skipped > 0 {
        debug!("Skipped {} of {} hrefs on {}", skipped, hrefs.len(), base);
    }

    dedupe(resolved)
}
