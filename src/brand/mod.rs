//! Brand detection and the per-brand capability registry.
//!
//! Every brand-specific behaviour (code extraction, CDN candidate expansion,
//! gallery scraping, URL similarity) lives behind [`BrandProfile`]. The
//! [`BrandRegistry`] maps a detected [`Brand`] to its profile and hands out the
//! generic profile for `Brand::Unknown` or any brand without a registration.

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

pub mod adidas;
pub mod asics;
pub mod generic;
pub mod new_balance;
pub mod nike;

use crate::candidates::CandidateIter;
use crate::cluster::Fingerprint;

/// Known storefront families, derived purely from URL text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    Asics,
    Nike,
    Adidas,
    NewBalance,
    Unknown,
}

impl Brand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Asics => "asics",
            Self::Nike => "nike",
            Self::Adidas => "adidas",
            Self::NewBalance => "new_balance",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "asics" => Ok(Self::Asics),
            "nike" => Ok(Self::Nike),
            "adidas" => Ok(Self::Adidas),
            "newbalance" | "nb" => Ok(Self::NewBalance),
            "unknown" | "generic" => Ok(Self::Unknown),
            _ => Err(format!("unknown brand '{}'", s)),
        }
    }
}

/// Case-insensitive marker table; the first matching entry wins.
///
/// A marker only counts at the start of a word, so `asics` does not fire
/// inside `basics`.
const BRAND_MARKERS: &[(&str, Brand)] = &[
    ("asics", Brand::Asics),
    ("nike.com", Brand::Nike),
    ("nike.", Brand::Nike),
    ("adidas", Brand::Adidas),
    ("newbalance", Brand::NewBalance),
    ("new-balance", Brand::NewBalance),
    ("nb.scene7", Brand::NewBalance),
];

/// Classifies URLs into brands by marker substrings
#[derive(Debug, Clone)]
pub struct BrandDetector {
    markers: Vec<(String, Brand)>,
}

impl BrandDetector {
    pub fn new() -> Self {
        Self {
            markers: BRAND_MARKERS
                .iter()
                .map(|(marker, brand)| (marker.to_string(), *brand))
                .collect(),
        }
    }

    pub fn detect(&self, url: &str) -> Brand {
        let lowered = url.to_lowercase();
        self.markers
            .iter()
            .find(|(marker, _)| contains_at_word_start(&lowered, marker))
            .map(|(_, brand)| *brand)
            .unwrap_or(Brand::Unknown)
    }
}

fn contains_at_word_start(text: &str, marker: &str) -> bool {
    text.match_indices(marker).any(|(start, _)| {
        text[..start]
            .chars()
            .next_back()
            .map_or(true, |prev| !prev.is_ascii_alphanumeric())
    })
}

impl Default for BrandDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized product identifier: uppercase alphanumerics joined by `_`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductCode(String);

impl ProductCode {
    /// Normalize a raw token; hyphens and other separators become a single `_`
    pub fn normalize(raw: &str) -> Option<Self> {
        let mut out = String::with_capacity(raw.len());
        let mut pending_separator = false;

        for c in raw.trim().chars() {
            if c.is_ascii_alphanumeric() {
                if pending_separator && !out.is_empty() {
                    out.push('_');
                }
                pending_separator = false;
                out.push(c.to_ascii_uppercase());
            } else {
                pending_separator = true;
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(Self(out))
        }
    }

    /// Join matched regex groups with the underscore joiner
    pub fn from_parts(parts: &[&str]) -> Option<Self> {
        Self::normalize(&parts.join("_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Underscore-separated segments of the code
    pub fn segments(&self) -> Vec<&str> {
        self.0.split('_').collect()
    }

    /// Alphabetic runs of at least `min_len` letters, lowercased
    pub fn alpha_runs(&self, min_len: usize) -> Vec<String> {
        self.0
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|run| run.len() >= min_len)
            .map(|run| run.to_lowercase())
            .collect()
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extra hints available to candidate generation
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// Host of the product page, when the run started from a URL
    pub page_host: Option<String>,
}

impl GenerationContext {
    pub fn for_page(url: &Url) -> Self {
        Self {
            page_host: url.host_str().map(|h| h.to_lowercase()),
        }
    }
}

/// Brand-specific capabilities used by every pipeline stage
pub trait BrandProfile: Send + Sync {
    fn brand(&self) -> Brand;

    /// Brand patterns first, then the shared generic patterns
    fn extract_code(&self, url: &str) -> Option<ProductCode> {
        generic::extract_code(url)
    }

    /// Lazily expanded candidate image URLs for a product code
    fn generate_candidates(&self, code: &ProductCode, ctx: &GenerationContext) -> CandidateIter;

    /// Ranked gallery selector lists; the first list with any match wins
    fn gallery_selectors(&self) -> &[&[&str]] {
        &[]
    }

    /// Candidate image URLs found in a rendered product page
    fn scrape_page(&self, document: &Html, base: &Url) -> Vec<String> {
        crate::scraper::extract::extract_candidates(document, base, self.gallery_selectors())
    }

    /// Precomputed comparison data for one URL
    fn fingerprint(&self, url: &str) -> Fingerprint {
        Fingerprint::generic(url)
    }

    /// Whether two fingerprinted URLs depict the same image
    fn is_similar(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        a.url == b.url || crate::cluster::signature_similar(a, b)
    }
}

/// Maps brands to their capability implementations
pub struct BrandRegistry {
    profiles: HashMap<Brand, Arc<dyn BrandProfile>>,
    fallback: Arc<dyn BrandProfile>,
}

impl BrandRegistry {
    /// Registry with every built-in brand
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(asics::AsicsProfile::new()));
        registry.register(Arc::new(nike::NikeProfile::new()));
        registry.register(Arc::new(adidas::AdidasProfile::new()));
        registry.register(Arc::new(new_balance::NewBalanceProfile::new()));
        registry
    }

    /// Registry that only knows the generic fallback
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
            fallback: Arc::new(generic::GenericProfile::new()),
        }
    }

    pub fn register(&mut self, profile: Arc<dyn BrandProfile>) {
        self.profiles.insert(profile.brand(), profile);
    }

    pub fn profile(&self, brand: Brand) -> Arc<dyn BrandProfile> {
        self.profiles
            .get(&brand)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for BrandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
