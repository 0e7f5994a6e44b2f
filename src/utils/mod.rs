/// Utility functions and helpers
use std::collections::HashSet;
use std::hash::Hash;
use url::Url;

use crate::error::{ImageFinderError, ImageFinderResult};

/// Parse a product page URL, rejecting anything that is not absolute http(s)
pub fn parse_page_url(input: &str) -> ImageFinderResult<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ImageFinderError::invalid_input(input, "empty URL"));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ImageFinderError::invalid_input(input, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ImageFinderError::invalid_input(
                input,
                format!("unsupported scheme '{}'", other),
            ))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ImageFinderError::invalid_input(input, "missing host"));
    }

    Ok(url)
}

/// `scheme://host[:port]` of a URL
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

/// The most brand-like label of a host: `www.shop.example.co.uk` -> `example`
pub fn host_label(host: &str) -> Option<String> {
    const SECOND_LEVEL: &[&str] = &["co", "com", "net", "org", "ac", "gov"];

    let labels: Vec<&str> = host
        .split('.')
        .filter(|l| !l.is_empty())
        .collect();

    if labels.len() < 2 {
        return labels.first().map(|l| l.to_lowercase());
    }

    let mut index = labels.len() - 2;
    if labels.len() >= 3 && SECOND_LEVEL.contains(&labels[index]) && labels[labels.len() - 1].len() == 2 {
        index -= 1;
    }

    Some(labels[index].to_lowercase())
}

/// URL without query string or fragment
pub fn strip_query(url: &str) -> &str {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    &url[..end]
}

/// Last path segment of a URL, without query string
pub fn file_name(url: &str) -> &str {
    let path = strip_query(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its extension
pub fn file_stem(url: &str) -> &str {
    let name = file_name(url);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Resolve a raw attribute/script value against the page base URL.
///
/// Returns `None` for empty values and non-fetchable schemes (`data:`,
/// `javascript:`, `blob:`, bare fragments).
pub fn resolve_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches(|c: char| c == '"' || c == '\'');
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("javascript:") || lower.starts_with("blob:") {
        return None;
    }

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(raw).ok().map(|u| u.to_string());
    }

    if raw.starts_with("//") {
        return Url::parse(&format!("{}:{}", base.scheme(), raw))
            .ok()
            .map(|u| u.to_string());
    }

    let resolved = base.join(raw).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Exact-match dedup that keeps first-seen order
pub fn dedup_preserving_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
