//! Greedy similarity clustering of candidate URLs.
//!
//! The first unclustered URL seeds a cluster and absorbs every later
//! unclustered URL its brand profile judges similar to the seed. Similarity is
//! not transitive, so the result depends on input order; callers keep
//! generation order stable to keep clustering deterministic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::brand::BrandProfile;
use crate::utils::{file_stem, strip_query};

static SIZE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[_-]?\d{2,5}x\d{2,5}$").unwrap());

/// Resolution markers, highest priority first
const RESOLUTION_MARKERS: &[(&str, u8)] = &[
    ("zoom", 5),
    ("1800", 4),
    ("1200", 3),
    ("900", 2),
    ("600", 1),
];

/// Structural identity of a brand CDN URL: product code plus view/angle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub code: String,
    pub view: Option<String>,
}

impl Signature {
    /// Build from a brand regex; code groups are joined with `_`
    pub fn capture(re: &Regex, url: &str, code_groups: &[usize], view_group: Option<usize>) -> Option<Self> {
        let caps = re.captures(url)?;

        let code = code_groups
            .iter()
            .filter_map(|&i| caps.get(i))
            .map(|m| m.as_str().to_uppercase())
            .collect::<Vec<_>>()
            .join("_");
        if code.is_empty() {
            return None;
        }

        let view = view_group
            .and_then(|i| caps.get(i))
            .map(|m| m.as_str().trim_matches(|c: char| c == '_' || c == '-').to_uppercase())
            .filter(|v| !v.is_empty());

        Some(Self { code, view })
    }
}

/// Precomputed comparison data for one candidate URL
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub url: String,
    /// URL without query and without a trailing `WxH` filename suffix
    pub stripped: String,
    /// Size-stripped filename without extension
    pub stem: String,
    pub signature: Option<Signature>,
}

impl Fingerprint {
    pub fn generic(url: &str) -> Self {
        let base = strip_query(url);
        let raw_stem = file_stem(url);
        let stem = SIZE_SUFFIX.replace(raw_stem, "").into_owned();

        let name_start = base.rfind('/').map_or(0, |i| i + 1);
        let (dir, name) = base.split_at(name_start);
        let extension = name.strip_prefix(raw_stem).unwrap_or("");
        let stripped = format!("{}{}{}", dir, stem, extension);

        Self {
            url: url.to_string(),
            stripped,
            stem,
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: Option<Signature>) -> Self {
        self.signature = signature;
        self
    }
}

/// Generic rule: equal stripped URLs, else equal bare filenames
pub fn generic_similar(a: &Fingerprint, b: &Fingerprint) -> bool {
    if a.url == b.url || a.stripped == b.stripped {
        return true;
    }
    !a.stem.is_empty() && a.stem == b.stem
}

/// Known-brand rule: compare signatures when both URLs carry one.
///
/// Two signatures without a view component count as the same base image.
/// URLs the brand pattern does not recognize fall back to the generic rule.
pub fn signature_similar(a: &Fingerprint, b: &Fingerprint) -> bool {
    match (&a.signature, &b.signature) {
        (Some(sa), Some(sb)) => sa.code == sb.code && sa.view == sb.view,
        _ => generic_similar(a, b),
    }
}

/// Heuristic resolution score inferred from URL substrings
pub fn resolution_priority(url: &str) -> u8 {
    let lowered = url.to_lowercase();
    RESOLUTION_MARKERS
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

/// URLs judged to depict the same image, with one designated representative
#[derive(Debug, Clone, Serialize)]
pub struct UrlCluster {
    members: Vec<String>,
    representative: usize,
}

impl UrlCluster {
    fn new(members: Vec<String>) -> Self {
        let representative = pick_representative(&members);
        Self { members, representative }
    }

    pub fn representative(&self) -> &str {
        &self.members[self.representative]
    }

    /// Members in input order; the seed is first
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Highest priority wins; ties keep the earliest member
fn pick_representative(members: &[String]) -> usize {
    let mut best = 0;
    let mut best_score = None;
    for (index, url) in members.iter().enumerate() {
        let score = resolution_priority(url);
        if best_score.map_or(true, |current| score > current) {
            best = index;
            best_score = Some(score);
        }
    }
    best
}

/// Greedy, order-dependent clustering
#[derive(Debug, Clone, Default)]
pub struct SimilarityClusterer;

impl SimilarityClusterer {
    pub fn new() -> Self {
        Self
    }

    pub fn cluster(&self, urls: &[String], profile: &dyn BrandProfile) -> Vec<UrlCluster> {
        let fingerprints: Vec<Fingerprint> = urls.iter().map(|u| profile.fingerprint(u)).collect();
        let mut assigned = vec![false; urls.len()];
        let mut clusters = Vec::new();

        for seed in 0..urls.len() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut members = vec![urls[seed].clone()];

            for other in (seed + 1)..urls.len() {
                if !assigned[other] && profile.is_similar(&fingerprints[seed], &fingerprints[other]) {
                    assigned[other] = true;
                    members.push(urls[other].clone());
                }
            }

            clusters.push(UrlCluster::new(members));
        }

        debug!("Clustered {} candidates into {} groups", urls.len(), clusters.len());
        clusters
    }

    /// One representative per cluster, in cluster order
    pub fn representatives(&self, urls: &[String], profile: &dyn BrandProfile) -> Vec<String> {
        self.cluster(urls, profile)
            .iter()
            .map(|c| c.representative().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::{Brand, BrandRegistry};

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generic_fingerprint_strips_size_and_query() {
        let fp = Fingerprint::generic("https://cdn.example.com/img/SKU1_front_800x800.jpg?v=3");
        assert_eq!(fp.stripped, "https://cdn.example.com/img/SKU1_front.jpg");
        assert_eq!(fp.stem, "SKU1_front");

        let other = Fingerprint::generic("https://cdn.example.com/img/SKU1_front-1200x1200.jpg");
        assert!(generic_similar(&fp, &other));
    }

    #[test]
    fn test_generic_filename_fallback() {
        let a = Fingerprint::generic("https://a.example.com/x/SKU1_back.jpg");
        let b = Fingerprint::generic("https://b.example.com/y/SKU1_back.png?w=900");
        let c = Fingerprint::generic("https://a.example.com/x/SKU1_side.jpg");
        assert!(generic_similar(&a, &b));
        assert!(!generic_similar(&a, &c));
    }

    #[test]
    fn test_resolution_priority_order() {
        assert!(resolution_priority("x?$ZOOM$") > resolution_priority("x?wid=1800"));
        assert!(resolution_priority("x?wid=1800") > resolution_priority("x?wid=1200"));
        assert!(resolution_priority("x?wid=1200") > resolution_priority("x?wid=900"));
        assert!(resolution_priority("x?wid=900") > resolution_priority("x?wid=600"));
        assert!(resolution_priority("x?wid=600") > resolution_priority("x.jpg"));
    }

    #[test]
    fn test_zoom_wins_tie_break() {
        let registry = BrandRegistry::new();
        let generic = registry.profile(Brand::Unknown);
        let cluster_input = urls(&[
            "https://cdn.example.com/p/SKU9_1.jpg?w=600",
            "https://cdn.example.com/p/SKU9_1.jpg?w=900",
            "https://cdn.example.com/p/SKU9_1.jpg?w=1800",
            "https://cdn.example.com/p/SKU9_1.jpg?mode=zoom",
        ]);

        let clusters = SimilarityClusterer::new().cluster(&cluster_input, generic.as_ref());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].representative(), "https://cdn.example.com/p/SKU9_1.jpg?mode=zoom");
    }

    #[test]
    fn test_ties_keep_original_order() {
        let registry = BrandRegistry::new();
        let generic = registry.profile(Brand::Unknown);
        let input = urls(&[
            "https://a.example.com/p/SKU9_1.jpg",
            "https://b.example.com/p/SKU9_1.jpg",
        ]);

        let reps = SimilarityClusterer::new().representatives(&input, generic.as_ref());
        assert_eq!(reps, vec!["https://a.example.com/p/SKU9_1.jpg"]);
    }

    #[test]
    fn test_clusters_partition_input() {
        let registry = BrandRegistry::new();
        let asics = registry.profile(Brand::Asics);
        let input = urls(&[
            "https://images.asics.com/is/image/asics/1203A474_002_SR_RT_GLB?$zoom$",
            "https://images.asics.com/is/image/asics/1203A474_002_SB_FR_GLB?wid=1200",
            "https://asics.scene7.com/is/image/asics/1203a474_002_SR_RT_AJP?wid=900",
            "https://images.asics.com/is/image/asics/1203A474_002_GLB",
            "https://www.asics.com/static/logo.png",
            "https://images.asics.com/is/image/asics/1203A474_002",
        ]);

        let clusters = SimilarityClusterer::new().cluster(&input, asics.as_ref());

        let mut flattened: Vec<String> = clusters.iter().flat_map(|c| c.members().to_vec()).collect();
        flattened.sort();
        let mut expected = input.clone();
        expected.sort();
        assert_eq!(flattened, expected);

        // right profile shot in two regions, front shot, base image, logo
        assert_eq!(clusters.len(), 4);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[0].representative(), input[0]);
        assert_eq!(clusters[2].members(), &[input[3].clone(), input[5].clone()][..]);
    }

    #[test]
    fn test_clustering_is_greedy_and_order_dependent() {
        let registry = BrandRegistry::new();
        let asics = registry.profile(Brand::Asics);
        // a~b and b~c by filename, a and c carry different views
        let a = "https://one.example.com/1203A474_002_SR_RT/img.jpg";
        let b = "https://two.example.com/gallery/img.jpg";
        let c = "https://one.example.com/1203A474_002_SB_FR/img.jpg";

        let clusterer = SimilarityClusterer::new();
        let seeded_by_a = clusterer.cluster(&urls(&[a, b, c]), asics.as_ref());
        assert_eq!(seeded_by_a.len(), 2);
        assert_eq!(seeded_by_a[0].members(), &[a.to_string(), b.to_string()][..]);

        let seeded_by_b = clusterer.cluster(&urls(&[b, a, c]), asics.as_ref());
        assert_eq!(seeded_by_b.len(), 1);
    }
}
