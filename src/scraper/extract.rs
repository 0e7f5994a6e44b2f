//! Candidate image URLs from rendered product page markup.
//!
//! Every rule is best effort: a selector that fails to parse or a script blob
//! that is not valid JSON is skipped and the remaining rules still run.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::utils::{dedup_preserving_order, resolve_url, strip_query};

/// Directory names that only ever hold beacons
const TRACKING_SEGMENTS: &[&str] = &[
    "pixel",
    "pixels",
    "tracking",
    "track",
    "analytics",
    "beacon",
    "beacons",
];

/// Attributes that carry an image URL on `<img>`-like elements
const IMAGE_ATTRIBUTES: &[&str] = &[
    "src",
    "data-src",
    "data-lazy",
    "data-lazy-src",
    "data-original",
];

const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset"];

static TINY_DIMENSIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[?&](?:w|h|width|height)=1(?:&|$))|(?:(?:^|[^0-9])1x1(?:[^0-9]|$))").unwrap()
});

/// Whole file names of beacons and layout filler; product names that merely
/// contain one of these words do not match
static TRACKING_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:pixel|tracking|beacon|spacer)(?:[_-]?\d+)?(?:\.(?:gif|png|jpe?g|webp))?|(?:clear|blank|transparent)\.gif)$").unwrap()
});

static CSS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).unwrap());

static SCRIPT_IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:https?:)?//[^\s"'<>()\\]+?\.(?:jpe?g|png|webp|gif|avif)(?:\?[^\s"'<>()\\]*)?"#).unwrap()
});

/// Image servers such as scene7 serve extensionless asset paths
static SCRIPT_IMAGE_SERVER_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>()\\]+/is/image/[^\s"'<>()\\]+"#).unwrap()
});

/// JSON arrays assigned to image/media keys inside inline scripts
static SCRIPT_IMAGE_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"(?:images|imageUrls|media|gallery|assets)"\s*:\s*(\[[^\]]*\])"#).unwrap()
});

static ZOOM_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:zoom|large|hires|original)|\.(?:jpe?g|png|webp)(?:\?|$)").unwrap());

/// Collect candidate image URLs from a parsed product page.
///
/// `gallery` holds ranked selector lists; the first list matching any image
/// contributes its URLs ahead of the generic rules.
pub fn extract_candidates(document: &Html, page_url: &Url, gallery: &[&[&str]]) -> Vec<String> {
    let base = document_base(document, page_url);
    let mut raw: Vec<String> = Vec::new();

    raw.extend(gallery_images(document, gallery));
    raw.extend(meta_images(document));
    raw.extend(json_ld_images(document));
    raw.extend(img_tag_images(document));
    raw.extend(picture_source_images(document));
    raw.extend(background_images(document));
    raw.extend(zoom_links(document));
    raw.extend(script_images(document));

    let resolved = raw
        .iter()
        .filter_map(|value| resolve_url(&base, value))
        .filter(|url| !is_tracking_pixel(url));

    let candidates = dedup_preserving_order(resolved);
    debug!("Extracted {} page candidates from {}", candidates.len(), page_url);
    candidates
}

/// `<base href>` when present, otherwise the page URL
pub fn document_base(document: &Html, page_url: &Url) -> Url {
    let href = parse_selector("base[href]")
        .and_then(|sel| document.select(&sel).next())
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok());

    href.unwrap_or_else(|| page_url.clone())
}

/// Beacons, spacers and 1x1 images, judged by path segments and file name
pub fn is_tracking_pixel(url: &str) -> bool {
    let lowered = url.to_lowercase();
    if TINY_DIMENSIONS.is_match(&lowered) {
        return true;
    }

    let path = strip_query(&lowered);
    let path = path.split_once("//").map_or(path, |(_, rest)| rest);
    let mut segments: Vec<&str> = path.split('/').skip(1).collect();
    let name = segments.pop().unwrap_or("");

    segments.iter().any(|segment| TRACKING_SEGMENTS.contains(segment)) || TRACKING_FILE.is_match(name)
}

/// URL tokens of a `srcset` value, descriptors dropped
pub fn srcset_urls(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|entry| entry.split_whitespace().next())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!("Skipping selector '{}': {:?}", css, e);
            None
        }
    }
}

/// Image URLs carried by an element's own attributes
fn element_images(element: &ElementRef<'_>) -> Vec<String> {
    let attrs = element.value();
    let mut out: Vec<String> = IMAGE_ATTRIBUTES
        .iter()
        .filter_map(|name| attrs.attr(name))
        .map(str::to_string)
        .collect();

    for name in SRCSET_ATTRIBUTES {
        if let Some(srcset) = attrs.attr(name) {
            out.extend(srcset_urls(srcset));
        }
    }

    out.extend(
        attrs
            .attrs()
            .filter(|(name, _)| name.starts_with("data-zoom") || name.starts_with("data-large"))
            .map(|(_, value)| value.to_string()),
    );
    out
}

/// First selector list with any image wins
fn gallery_images(document: &Html, gallery: &[&[&str]]) -> Vec<String> {
    for selectors in gallery {
        let Some(selector) = parse_selector(&selectors.join(", ")) else {
            continue;
        };

        let found: Vec<String> = document
            .select(&selector)
            .flat_map(|el| element_images(&el))
            .collect();

        if !found.is_empty() {
            debug!("Gallery selectors {:?} matched {} images", selectors, found.len());
            return found;
        }
    }
    Vec::new()
}

fn meta_images(document: &Html) -> Vec<String> {
    let css = r#"meta[property="og:image"], meta[property="og:image:url"], meta[property="og:image:secure_url"], meta[name="og:image"], meta[name="twitter:image"]"#;
    parse_selector(css)
        .map(|sel| {
            document
                .select(&sel)
                .filter_map(|el| el.value().attr("content"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn json_ld_images(document: &Html) -> Vec<String> {
    let Some(selector) = parse_selector(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for node in document.select(&selector) {
        let text = node.text().collect::<String>();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => collect_ld_images(&value, &mut out),
            Err(e) => debug!("Ignoring malformed ld+json block: {}", e),
        }
    }
    out
}

/// `image` fields of schema.org nodes, following `@graph` and nested arrays
fn collect_ld_images(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_ld_images(item, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_ld_images(graph, out);
            }
            if let Some(image) = map.get("image") {
                collect_media_values(image, out);
            }
            // ProductGroup variants carry their own images
            if let Some(variants) = map.get("hasVariant") {
                collect_ld_images(variants, out);
            }
        }
        _ => {}
    }
}

/// Strings, arrays of strings, or objects with a URL-ish field
fn collect_media_values(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_media_values(item, out)),
        Value::Object(map) => {
            let url = ["url", "contentUrl", "src", "zoom", "large", "href"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            if let Some(url) = url {
                out.push(url.to_string());
            }
        }
        _ => {}
    }
}

fn img_tag_images(document: &Html) -> Vec<String> {
    parse_selector("img")
        .map(|sel| document.select(&sel).flat_map(|el| element_images(&el)).collect())
        .unwrap_or_default()
}

fn picture_source_images(document: &Html) -> Vec<String> {
    parse_selector("picture source")
        .map(|sel| {
            document
                .select(&sel)
                .flat_map(|el| {
                    SRCSET_ATTRIBUTES
                        .iter()
                        .filter_map(|name| el.value().attr(name))
                        .flat_map(srcset_urls)
                        .collect::<Vec<_>>()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `background-image: url(...)` in inline styles
fn background_images(document: &Html) -> Vec<String> {
    parse_selector("[style]")
        .map(|sel| {
            document
                .select(&sel)
                .filter_map(|el| el.value().attr("style"))
                .filter(|style| style.to_lowercase().contains("background"))
                .flat_map(|style| {
                    CSS_URL
                        .captures_iter(style)
                        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                        .collect::<Vec<_>>()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Anchors pointing at large renditions, plus any `data-zoom*` attribute
fn zoom_links(document: &Html) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(sel) = parse_selector("a[href]") {
        out.extend(
            document
                .select(&sel)
                .filter_map(|el| el.value().attr("href"))
                .filter(|href| ZOOM_HREF.is_match(href) && looks_like_image(href))
                .map(str::to_string),
        );
    }

    if let Some(sel) = parse_selector("*") {
        for el in document.select(&sel) {
            if el.value().name() == "img" {
                continue;
            }
            out.extend(
                el.value()
                    .attrs()
                    .filter(|(name, _)| name.starts_with("data-zoom"))
                    .map(|(_, value)| value.to_string()),
            );
        }
    }

    out
}

fn looks_like_image(href: &str) -> bool {
    let lowered = href.to_lowercase();
    let path = lowered.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    [".jpg", ".jpeg", ".png", ".webp", ".gif", ".avif"]
        .iter()
        .any(|ext| path.ends_with(ext))
        || lowered.contains("/is/image/")
}

/// Regex and JSON scraping of inline scripts
fn script_images(document: &Html) -> Vec<String> {
    let Some(selector) = parse_selector("script") else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for node in document.select(&selector) {
        if node.value().attr("type") == Some("application/ld+json") {
            continue;
        }

        let text = unescape_script(&node.text().collect::<String>());
        if text.trim().is_empty() {
            continue;
        }

        for caps in SCRIPT_IMAGE_ARRAY.captures_iter(&text) {
            let Some(array) = caps.get(1) else { continue };
            match serde_json::from_str::<Value>(array.as_str()) {
                Ok(value) => collect_media_values(&value, &mut out),
                Err(e) => debug!("Ignoring unparsable script image array: {}", e),
            }
        }

        out.extend(SCRIPT_IMAGE_URL.find_iter(&text).map(|m| m.as_str().to_string()));
        out.extend(SCRIPT_IMAGE_SERVER_URL.find_iter(&text).map(|m| m.as_str().to_string()));
    }
    out
}

/// Undo JSON string escaping of slashes
fn unescape_script(text: &str) -> String {
    text.replace("\\/", "/")
        .replace("\\u002F", "/")
        .replace("\\u002f", "/")
}
