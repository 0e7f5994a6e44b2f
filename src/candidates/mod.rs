//! Combinatorial candidate URL expansion.
//!
//! Brands describe their CDN naming as [`UrlTemplate`]s. A template is
//! expanded lazily over the cross product of code variants, view tokens,
//! region suffixes, size suffixes and hosts, so very large expansions never
//! need to be materialized before dedup and capping.

use std::sync::Arc;
use tracing::debug;

use crate::brand::{BrandProfile, GenerationContext, ProductCode};
use crate::utils::dedup_preserving_order;

/// Lazily produced candidate URLs
pub type CandidateIter = Box<dyn Iterator<Item = String> + Send>;

/// A URL pattern with `{host}`, `{code}`, `{view}`, `{region}` and `{size}` slots
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    pattern: String,
    hosts: Vec<String>,
    views: Vec<String>,
    regions: Vec<String>,
    sizes: Vec<String>,
}

impl UrlTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            hosts: vec![String::new()],
            views: vec![String::new()],
            regions: vec![String::new()],
            sizes: vec![String::new()],
        }
    }

    pub fn hosts<S: AsRef<str>>(mut self, hosts: &[S]) -> Self {
        self.hosts = to_axis(hosts);
        self
    }

    pub fn views<S: AsRef<str>>(mut self, views: &[S]) -> Self {
        self.views = to_axis(views);
        self
    }

    pub fn regions<S: AsRef<str>>(mut self, regions: &[S]) -> Self {
        self.regions = to_axis(regions);
        self
    }

    pub fn sizes<S: AsRef<str>>(mut self, sizes: &[S]) -> Self {
        self.sizes = to_axis(sizes);
        self
    }

    /// Lazy cross product over the given code variants
    pub fn expand(&self, codes: Vec<String>) -> Expansion {
        Expansion::new(Arc::new(self.clone()), codes)
    }

    fn render(&self, code: &str, view: &str, region: &str, size: &str, host: &str) -> String {
        self.pattern
            .replace("{host}", host)
            .replace("{code}", code)
            .replace("{view}", view)
            .replace("{region}", region)
            .replace("{size}", size)
    }
}

/// An empty axis still contributes one (empty) value so the product is non-empty
fn to_axis<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    if values.is_empty() {
        vec![String::new()]
    } else {
        values.iter().map(|v| v.as_ref().to_string()).collect()
    }
}

/// Odometer over codes × views × regions × sizes × hosts; hosts turn fastest
pub struct Expansion {
    template: Arc<UrlTemplate>,
    codes: Vec<String>,
    indices: [usize; 5],
    done: bool,
}

impl Expansion {
    fn new(template: Arc<UrlTemplate>, codes: Vec<String>) -> Self {
        let done = codes.is_empty();
        Self {
            template,
            codes,
            indices: [0; 5],
            done,
        }
    }

    fn limits(&self) -> [usize; 5] {
        [
            self.codes.len(),
            self.template.views.len(),
            self.template.regions.len(),
            self.template.sizes.len(),
            self.template.hosts.len(),
        ]
    }

    fn advance(&mut self) {
        let limits = self.limits();
        for axis in (0..5).rev() {
            self.indices[axis] += 1;
            if self.indices[axis] < limits[axis] {
                return;
            }
            self.indices[axis] = 0;
        }
        self.done = true;
    }
}

impl Iterator for Expansion {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        let [c, v, r, s, h] = self.indices;
        let t = &self.template;
        let url = t.render(&self.codes[c], &t.views[v], &t.regions[r], &t.sizes[s], &t.hosts[h]);

        self.advance();
        Some(url)
    }
}

/// Chain several templates over the same code variants into one lazy stream
pub fn expand_all(templates: Vec<UrlTemplate>, codes: Vec<String>) -> CandidateIter {
    Box::new(
        templates
            .into_iter()
            .flat_map(move |template| template.expand(codes.clone())),
    )
}

/// Runs a brand profile's generator and applies exact dedup and the optional cap
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    max_candidates: Option<usize>,
}

impl CandidateGenerator {
    pub fn new(max_candidates: Option<usize>) -> Self {
        Self { max_candidates }
    }

    pub fn generate(
        &self,
        profile: &dyn BrandProfile,
        code: &ProductCode,
        ctx: &GenerationContext,
    ) -> Vec<String> {
        let stream = profile.generate_candidates(code, ctx);
        let candidates = match self.max_candidates {
            Some(cap) => dedup_capped(stream, cap),
            None => dedup_preserving_order(stream),
        };

        debug!(
            "Generated {} candidates for {} ({})",
            candidates.len(),
            code,
            profile.brand()
        );
        candidates
    }
}

/// Dedup while consuming only as much of the stream as the cap needs
fn dedup_capped(stream: CandidateIter, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for url in stream {
        if out.len() >= cap {
            break;
        }
        if seen.insert(url.clone()) {
            out.push(url);
        }
    }
    out
}
