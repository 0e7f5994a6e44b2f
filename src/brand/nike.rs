use once_cell::sync::Lazy;
use regex::Regex;

use super::{generic, Brand, BrandProfile, GenerationContext, ProductCode};
use crate::candidates::{expand_all, CandidateIter, UrlTemplate};
use crate::cluster::{Fingerprint, Signature};

/// Style-colour codes such as `DV3853-001`
static CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)/([a-z]{2}\d{4})-(\d{3})(?:[/?#]|$)").unwrap(),
        Regex::new(r"(?i)[?&](?:style[-_]?color|pid|sku)=([a-z]{2}\d{4})[-_](\d{3})").unwrap(),
        Regex::new(r"(?i)\b([a-z]{2}\d{4})[-_](\d{3})\b").unwrap(),
    ]
});

static SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([a-z]{2}\d{4})[_-](\d{3})(?:_([a-z])_prem)?").unwrap());

const SCENE7_HOSTS: &[&str] = &[
    "secure-images.nike.com/is/image/DotCom",
    "images.nike.com/is/image/DotCom",
];

const VIEWS: &[&str] = &[
    "_A_PREM", "_B_PREM", "_C_PREM", "_D_PREM", "_E_PREM", "_F_PREM", "_H_PREM", "_K_PREM", "_P_PREM",
];

const SCENE7_SIZES: &[&str] = &[
    "?$PDP_ZOOM$",
    "?wid=1800&hei=1800&fmt=png-alpha",
    "?wid=1200&hei=1200&fmt=png-alpha",
    "?wid=900&hei=900",
    "",
];

const STATIC_SIZES: &[&str] = &["1800", "1200", "900", "600"];

const GALLERY_SELECTORS: &[&[&str]] = &[
    &["[data-testid='HeroImg']", "[data-testid='Thumbnail'] img"],
    &["#pdp-6-up img", ".css-1fxh5tw img"],
    &[".product-image img"],
];

pub struct NikeProfile;

impl NikeProfile {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NikeProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl BrandProfile for NikeProfile {
    fn brand(&self) -> Brand {
        Brand::Nike
    }

    fn extract_code(&self, url: &str) -> Option<ProductCode> {
        generic::first_match(&CODE_PATTERNS, url).or_else(|| generic::extract_code(url))
    }

    fn generate_candidates(&self, code: &ProductCode, _ctx: &GenerationContext) -> CandidateIter {
        let underscored = code.as_str().to_string();
        let hyphenated = underscored.replace('_', "-");

        let scene7 = expand_all(
            vec![UrlTemplate::new("https://{host}/{code}{view}{size}")
                .hosts(SCENE7_HOSTS)
                .views(VIEWS)
                .sizes(SCENE7_SIZES)],
            vec![underscored.clone(), underscored.to_lowercase()],
        );

        // static.nike.com keeps the hyphenated code in the asset name
        let cdn = expand_all(
            vec![UrlTemplate::new("https://{host}/a/images/t_PDP_{size}_v1/f_auto,q_auto:eco/{code}{view}.png")
                .hosts(&["static.nike.com"])
                .views(VIEWS)
                .sizes(STATIC_SIZES)],
            vec![hyphenated],
        );

        Box::new(scene7.chain(cdn))
    }

    fn gallery_selectors(&self) -> &[&[&str]] {
        GALLERY_SELECTORS
    }

    fn fingerprint(&self, url: &str) -> Fingerprint {
        Fingerprint::generic(url).with_signature(Signature::capture(&SIGNATURE, url, &[1, 2], Some(3)))
    }
}
