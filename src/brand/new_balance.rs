use once_cell::sync::Lazy;
use regex::Regex;

use super::{generic, Brand, BrandProfile, GenerationContext, ProductCode};
use crate::candidates::{expand_all, CandidateIter, UrlTemplate};
use crate::cluster::{Fingerprint, Signature};

/// Style codes such as `M990GL6` or `WL574EVG`
static CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)/pd/[^/]+/([a-z]{1,3}\d{3,4}[a-z0-9]{0,4})(?:-[a-z0-9]+)*\.html").unwrap(),
        Regex::new(r"(?i)[?&](?:pid|style|dwvar_[a-z0-9]+_style)=([a-z]{1,3}\d{3,4}[a-z0-9]{0,4})\b").unwrap(),
        Regex::new(r"(?i)/([a-z]{1,3}\d{3,4}[a-z]{1,3}\d?)(?:\.html|[/?#]|$)").unwrap(),
    ]
});

static SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/([a-z]{1,3}\d{3,4}[a-z0-9]{0,4})_nb_(\d{2})_i").unwrap());

const VIEWS: &[&str] = &[
    "_nb_02_i", "_nb_03_i", "_nb_04_i", "_nb_05_i", "_nb_06_i", "_nb_07_i", "_nb_01_i",
];

const SIZES: &[&str] = &[
    "?$pdpflexf2$&wid=1800&hei=1800",
    "?$pdpflexf2$&wid=1200&hei=1200",
    "?$pdpflexf2$&wid=900&hei=900",
    "?$pdpflexf2$&wid=600&hei=600",
    "",
];

const GALLERY_SELECTORS: &[&[&str]] = &[
    &[".pdp-image-carousel img", ".product-carousel img"],
    &["[data-image-index] img", ".image-container img"],
];

pub struct NewBalanceProfile;

impl NewBalanceProfile {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NewBalanceProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl BrandProfile for NewBalanceProfile {
    fn brand(&self) -> Brand {
        Brand::NewBalance
    }

    fn extract_code(&self, url: &str) -> Option<ProductCode> {
        generic::first_match(&CODE_PATTERNS, url).or_else(|| generic::extract_code(url))
    }

    /// Scene7 asset names are lowercase
    fn generate_candidates(&self, code: &ProductCode, _ctx: &GenerationContext) -> CandidateIter {
        let templates = vec![UrlTemplate::new("https://{host}/{code}{view}{size}")
            .hosts(&["nb.scene7.com/is/image/NB"])
            .views(VIEWS)
            .sizes(SIZES)];
        expand_all(templates, vec![code.as_str().to_lowercase()])
    }

    fn gallery_selectors(&self) -> &[&[&str]] {
        GALLERY_SELECTORS
    }

    fn fingerprint(&self, url: &str) -> Fingerprint {
        Fingerprint::generic(url).with_signature(Signature::capture(&SIGNATURE, url, &[1], Some(2)))
    }
}
