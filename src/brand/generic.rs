//! Fallback behaviour shared by every brand: URL-shape code extraction and
//! guessed CDN layouts for storefronts without a dedicated profile.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Brand, BrandProfile, GenerationContext, ProductCode};
use crate::candidates::{expand_all, CandidateIter, UrlTemplate};
use crate::utils::{dedup_preserving_order, host_label};

/// Shortest normalized code accepted from generic patterns
const MIN_CODE_LEN: usize = 4;

/// Segment after a catalogue keyword, when it carries a digit
static KEYWORD_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(?:p|product|products|dp|item|items|sku|style)/([a-z0-9][a-z0-9_-]*?\d[a-z0-9_-]*?)(?:\.html?|\.aspx|\.php)?(?:[/?#]|$)").unwrap()
});

/// Trailing code-like token of the last path segment
static TRAILING_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[/_-])([a-z]{0,4}\d{3,}[a-z0-9]*(?:[-_][a-z0-9]{2,})*)(?:\.html?|\.aspx|\.php)?/?$").unwrap()
});

static QUERY_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[?&](?:sku|pid|productid|product_id|itemid|item_id|style|code|article)=([a-z0-9_-]+)").unwrap()
});

/// Path-segment patterns, then query-parameter patterns
pub fn extract_code(url: &str) -> Option<ProductCode> {
    let path = path_of(url);

    if let Some(code) = KEYWORD_SEGMENT
        .captures(path)
        .and_then(|caps| caps.get(1))
        .and_then(|m| accept(m.as_str()))
    {
        return Some(code);
    }

    if let Some(code) = TRAILING_SEGMENT
        .captures(path)
        .and_then(|caps| caps.get(1))
        .and_then(|m| accept(m.as_str()))
    {
        return Some(code);
    }

    QUERY_PARAM
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| accept(m.as_str()))
}

/// First matching pattern wins; its capture groups are joined with `_`
pub fn first_match(patterns: &[Regex], text: &str) -> Option<ProductCode> {
    patterns.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let parts: Vec<&str> = caps
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str())
            .collect();
        ProductCode::from_parts(&parts)
    })
}

fn accept(raw: &str) -> Option<ProductCode> {
    ProductCode::normalize(raw).filter(|code| code.as_str().len() >= MIN_CODE_LEN)
}

/// Path portion of an absolute URL, or the whole string for bare paths
fn path_of(url: &str) -> &str {
    let without_scheme = url.find("://").map_or(url, |i| &url[i + 3..]);
    let path_start = without_scheme.find('/').unwrap_or(without_scheme.len());
    let path = &without_scheme[path_start..];
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    &path[..end]
}

/// Brand-name guesses used when the page host gives nothing better
const DEFAULT_VOCABULARY: &[&str] = &["shop", "store"];

const HOST_TEMPLATES: &[&str] = &[
    "cdn.{brand}.com",
    "images.{brand}.com",
    "static.{brand}.com",
    "media.{brand}.com",
];

const GENERIC_VIEWS: &[&str] = &["", "_1", "_2", "_3", "_4", "_front", "_back", "_side", "_detail"];

const GENERIC_SIZES: &[&str] = &["", "?w=1800", "?width=1200", "?w=900"];

/// Profile for storefronts without dedicated knowledge
#[derive(Debug, Default)]
pub struct GenericProfile;

impl GenericProfile {
    pub fn new() -> Self {
        Self
    }

    /// Candidate `{brand}` fillers: page host label, code words, default vocabulary
    pub fn brand_tokens(code: &ProductCode, ctx: &GenerationContext) -> Vec<String> {
        let from_host = ctx.page_host.as_deref().and_then(host_label);
        let tokens = from_host
            .into_iter()
            .chain(code.alpha_runs(3))
            .chain(DEFAULT_VOCABULARY.iter().map(|s| s.to_string()));
        dedup_preserving_order(tokens)
    }

    fn templates(tokens: &[String]) -> Vec<UrlTemplate> {
        let cdn_hosts: Vec<String> = tokens
            .iter()
            .flat_map(|token| HOST_TEMPLATES.iter().map(move |t| t.replace("{brand}", token)))
            .collect();
        let scene7_hosts: Vec<String> = tokens
            .iter()
            .map(|token| format!("{0}.scene7.com/is/image/{0}", token))
            .collect();

        vec![
            UrlTemplate::new("https://{host}/images/products/{code}{view}{region}.jpg{size}")
                .hosts(&cdn_hosts[..])
                .views(GENERIC_VIEWS)
                .sizes(GENERIC_SIZES),
            UrlTemplate::new("https://{host}/{code}{view}{region}{size}")
                .hosts(&scene7_hosts[..])
                .views(GENERIC_VIEWS)
                .sizes(&["", "?wid=1800", "?wid=1200", "?wid=900"]),
        ]
    }
}

impl BrandProfile for GenericProfile {
    fn brand(&self) -> Brand {
        Brand::Unknown
    }

    fn generate_candidates(&self, code: &ProductCode, ctx: &GenerationContext) -> CandidateIter {
        let tokens = Self::brand_tokens(code, ctx);
        let upper = code.as_str().to_string();
        let codes = dedup_preserving_order(vec![
            upper.clone(),
            upper.to_lowercase(),
            upper.replace('_', "-"),
            upper.replace('_', "-").to_lowercase(),
        ]);

        expand_all(Self::templates(&tokens), codes)
    }
}
