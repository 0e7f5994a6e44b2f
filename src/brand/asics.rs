use once_cell::sync::Lazy;
use regex::Regex;

use super::{generic, Brand, BrandProfile, GenerationContext, ProductCode};
use crate::candidates::{expand_all, CandidateIter, UrlTemplate};
use crate::cluster::{Fingerprint, Signature};

/// Style (`1203A474`) plus colourway (`002`), most specific shape first
static CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)/p/(?:[a-z]{2,3}_)?(\d{4}[a-z]\d{3})[-_.](\d{3})").unwrap(),
        Regex::new(r"(?i)(?:^|[/_=-])(\d{4}[a-z]\d{3})[-_.](\d{3})(?:\.html|[/?#_.]|$)").unwrap(),
        Regex::new(r"(?i)/(\d{4}[a-z]\d{3})(?:\.html|[/?#]|$)").unwrap(),
    ]
});

/// `<style>_<colour>[_<view>]` inside a scene7 asset name
static SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{4}[a-z]\d{3})[_-](\d{3})((?:_[a-z]{2}_[a-z]{2})?)").unwrap());

const HOSTS: &[&str] = &[
    "images.asics.com/is/image/asics",
    "asics.scene7.com/is/image/asics",
];

const VIEWS: &[&str] = &[
    "_SR_RT", "_SR_LT", "_SB_FR", "_SB_BK", "_SB_TP", "_SB_BT", "_SB_FL", "_SB_FO", "",
];

const REGIONS: &[&str] = &["_GLB", "_AJP", ""];

const SIZES: &[&str] = &[
    "?$zoom$",
    "?wid=1800&hei=1800",
    "?wid=1200&hei=1200",
    "?wid=900&hei=900",
    "?$sfcc-product$",
    "",
];

const GALLERY_SELECTORS: &[&[&str]] = &[
    &[".product-images img", ".pdp-image-carousel img"],
    &["[data-test='product-image'] img", ".primary-images img"],
    &[".swiper-slide img", "picture source"],
];

pub struct AsicsProfile {
    templates: Vec<UrlTemplate>,
}

impl AsicsProfile {
    pub fn new() -> Self {
        let templates = vec![UrlTemplate::new("https://{host}/{code}{view}{region}{size}")
            .hosts(HOSTS)
            .views(VIEWS)
            .regions(REGIONS)
            .sizes(SIZES)];
        Self { templates }
    }
}

impl Default for AsicsProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl BrandProfile for AsicsProfile {
    fn brand(&self) -> Brand {
        Brand::Asics
    }

    fn extract_code(&self, url: &str) -> Option<ProductCode> {
        generic::first_match(&CODE_PATTERNS, url).or_else(|| generic::extract_code(url))
    }

    fn generate_candidates(&self, code: &ProductCode, _ctx: &GenerationContext) -> CandidateIter {
        let upper = code.as_str().to_string();
        let codes = vec![upper.clone(), upper.to_lowercase()];
        expand_all(self.templates.clone(), codes)
    }

    fn gallery_selectors(&self) -> &[&[&str]] {
        GALLERY_SELECTORS
    }

    fn fingerprint(&self, url: &str) -> Fingerprint {
        Fingerprint::generic(url).with_signature(Signature::capture(&SIGNATURE, url, &[1, 2], Some(3)))
    }
}
