use once_cell::sync::Lazy;
use regex::Regex;

use super::{generic, Brand, BrandProfile, GenerationContext, ProductCode};
use crate::candidates::{expand_all, CandidateIter, UrlTemplate};
use crate::cluster::{Fingerprint, Signature};

/// Article numbers such as `B75806` or `IE8976`
static CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)/([a-z]{1,2}\d{4,5})\.html").unwrap(),
        Regex::new(r"(?i)[?&](?:pid|article|articleno)=([a-z]{1,2}\d{4,5})\b").unwrap(),
        Regex::new(r"(?i)/([a-z]{2}\d{4})(?:[/?#]|$)").unwrap(),
    ]
});

/// `<article>_<nn>_<kind>` asset names, e.g. `IE8976_01_standard`
static SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/([a-z]{1,2}\d{4,5})(?:_(\d{2}_[a-z]+(?:_hover)?))?\.(?:jpg|png|webp)").unwrap());

const VIEWS: &[&str] = &[
    "_01_standard",
    "_02_standard",
    "_03_standard",
    "_04_standard",
    "_05_standard",
    "_06_standard",
    "_09_standard",
    "_41_detail",
    "_42_detail",
    "_01_standard_hover",
];

const SIZES: &[&str] = &[
    "w_1800,f_auto,q_auto",
    "w_1200,f_auto,q_auto",
    "w_900,f_auto,q_auto",
    "w_600,f_auto,q_auto",
    "h_2000,f_auto,q_auto,fl_lossy,c_fill,g_auto",
];

const GALLERY_SELECTORS: &[&[&str]] = &[
    &["[data-testid='pdp-gallery-picture'] img", "[data-auto-id='image-viewer'] img"],
    &[".view___3ORZ_ img", ".image-grid img"],
    &["#pdp-image-gallery img"],
];

pub struct AdidasProfile;

impl AdidasProfile {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdidasProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl BrandProfile for AdidasProfile {
    fn brand(&self) -> Brand {
        Brand::Adidas
    }

    fn extract_code(&self, url: &str) -> Option<ProductCode> {
        generic::first_match(&CODE_PATTERNS, url).or_else(|| generic::extract_code(url))
    }

    fn generate_candidates(&self, code: &ProductCode, _ctx: &GenerationContext) -> CandidateIter {
        let templates = vec![
            UrlTemplate::new("https://{host}/images/{size}/{code}{view}.jpg")
                .hosts(&["assets.adidas.com"])
                .views(VIEWS)
                .sizes(SIZES),
            UrlTemplate::new("https://{host}/images/{size}/{code}{view}.webp")
                .hosts(&["assets.adidas.com"])
                .views(VIEWS)
                .sizes(SIZES),
        ];
        expand_all(templates, vec![code.as_str().to_string()])
    }

    fn gallery_selectors(&self) -> &[&[&str]] {
        GALLERY_SELECTORS
    }

    fn fingerprint(&self, url: &str) -> Fingerprint {
        Fingerprint::generic(url).with_signature(Signature::capture(&SIGNATURE, url, &[1], Some(2)))
    }
}
