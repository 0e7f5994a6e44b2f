//! Existence checks for candidate image URLs.
//!
//! Candidates are probed in fixed-size batches: requests inside a batch run
//! concurrently, batches run one after another, and every batch runs even
//! when earlier ones already found images. A failed probe only excludes its
//! own URL.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ValidationConfig;
use crate::error::{ImageFinderError, ImageFinderResult};
use crate::scraper::user_agent::UserAgentRotator;
use crate::utils::origin_of;

const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// What the validator needs to know about one GET response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// First bytes of the body, at most the configured prefix length
    pub body_prefix: Vec<u8>,
}

/// Issues one image request; any error means "not an image"
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ImageFinderResult<ProbeResponse>;
}

/// Known image file signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageSignature {
    Jpeg,
    Png,
    Gif,
    Webp,
}

pub fn sniff_image_signature(bytes: &[u8]) -> Option<ImageSignature> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageSignature::Jpeg)
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some(ImageSignature::Png)
    } else if bytes.starts_with(b"GIF8") {
        Some(ImageSignature::Gif)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageSignature::Webp)
    } else {
        None
    }
}

/// Non-error status, then an `image/*` content type or a known signature
pub fn is_image_response(response: &ProbeResponse) -> bool {
    if response.status >= 400 {
        return false;
    }

    let declared_image = response
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);

    declared_image || sniff_image_signature(&response.body_prefix).is_some()
}

/// `HttpProbe` over reqwest with browser-like image request headers
pub struct ReqwestProbe {
    client: Client,
    user_agents: UserAgentRotator,
    prefix_bytes: usize,
}

impl ReqwestProbe {
    pub fn new(config: &ValidationConfig, user_agents: &[String]) -> ImageFinderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ImageFinderError::config(format!("failed to build probe client: {}", e)))?;

        Ok(Self {
            client,
            user_agents: UserAgentRotator::new(user_agents),
            prefix_bytes: config.prefix_bytes,
        })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn probe(&self, url: &str) -> ImageFinderResult<ProbeResponse> {
        let origin = origin_of(url)
            .ok_or_else(|| ImageFinderError::validation(url, "URL has no origin"))?;

        let mut response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agents.next_agent())
            .header("Accept", IMAGE_ACCEPT)
            .header("Referer", format!("{}/", origin))
            .header("Origin", origin.as_str())
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body_prefix = Vec::with_capacity(self.prefix_bytes);
        while body_prefix.len() < self.prefix_bytes {
            match response.chunk().await? {
                Some(chunk) => {
                    let wanted = self.prefix_bytes - body_prefix.len();
                    body_prefix.extend_from_slice(&chunk[..chunk.len().min(wanted)]);
                }
                None => break,
            }
        }

        Ok(ProbeResponse {
            status,
            content_type,
            body_prefix,
        })
    }
}

/// Outcome of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub size: usize,
    pub valid: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Confirmed images in input order
    pub valid: Vec<String>,
    pub batches: Vec<BatchSummary>,
}

/// Confirms candidates are real images with bounded concurrency
pub struct ExistenceValidator {
    probe: Arc<dyn HttpProbe>,
    batch_size: usize,
}

impl ExistenceValidator {
    pub fn new(probe: Arc<dyn HttpProbe>, batch_size: usize) -> Self {
        Self {
            probe,
            batch_size: batch_size.max(1),
        }
    }

    /// Never fails; errors and non-image responses are `false`
    pub async fn check(&self, url: &str) -> bool {
        match self.probe.probe(url).await {
            Ok(response) => {
                let valid = is_image_response(&response);
                if !valid {
                    debug!(
                        "Rejected {}: status {} content-type {:?}",
                        url, response.status, response.content_type
                    );
                }
                valid
            }
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                false
            }
        }
    }

    pub async fn validate(&self, urls: &[String]) -> Vec<String> {
        self.validate_with_report(urls).await.valid
    }

    pub async fn validate_with_report(&self, urls: &[String]) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (index, batch) in urls.chunks(self.batch_size).enumerate() {
            let results = join_all(batch.iter().map(|url| self.check(url))).await;

            let mut valid = 0;
            for (url, ok) in batch.iter().zip(results) {
                if ok {
                    valid += 1;
                    report.valid.push(url.clone());
                }
            }

            debug!("Batch {} validated {}/{} candidates", index + 1, valid, batch.len());
            report.batches.push(BatchSummary {
                index,
                size: batch.len(),
                valid,
            });
        }

        info!(
            "Validated {} of {} candidates in {} batches",
            report.valid.len(),
            urls.len(),
            report.batches.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PNG_PREFIX: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Serves canned responses and records concurrency
    #[derive(Default)]
    struct MockProbe {
        responses: HashMap<String, ProbeResponse>,
        failing: HashSet<String>,
        delay_ms: u64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl MockProbe {
        fn image(mut self, url: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                ProbeResponse {
                    status: 200,
                    content_type: Some("image/jpeg".into()),
                    body_prefix: vec![0xFF, 0xD8, 0xFF, 0xE0],
                },
            );
            self
        }

        fn failing(mut self, url: &str) -> Self {
            self.failing.insert(url.to_string());
            self
        }
    }

    #[async_trait]
    impl HttpProbe for MockProbe {
        async fn probe(&self, url: &str) -> ImageFinderResult<ProbeResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());

            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(url) {
                return Err(ImageFinderError::Timeout { url: url.to_string() });
            }
            Ok(self.responses.get(url).cloned().unwrap_or(ProbeResponse {
                status: 404,
                content_type: Some("text/html".into()),
                body_prefix: b"<html>".to_vec(),
            }))
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.example.com/img_{}.jpg", i)).collect()
    }

    #[test]
    fn test_signature_sniffing() {
        assert_eq!(sniff_image_signature(&[0xFF, 0xD8, 0xFF, 0xE1]), Some(ImageSignature::Jpeg));
        assert_eq!(sniff_image_signature(PNG_PREFIX), Some(ImageSignature::Png));
        assert_eq!(sniff_image_signature(b"GIF89a"), Some(ImageSignature::Gif));
        assert_eq!(sniff_image_signature(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(ImageSignature::Webp));
        assert_eq!(sniff_image_signature(b"<!DOCTYPE html>"), None);
        assert_eq!(sniff_image_signature(&[]), None);
    }

    #[test]
    fn test_png_signature_without_content_type() {
        let missing = ProbeResponse { status: 200, content_type: None, body_prefix: PNG_PREFIX.to_vec() };
        let wrong = ProbeResponse {
            status: 200,
            content_type: Some("application/octet-stream".into()),
            body_prefix: PNG_PREFIX.to_vec(),
        };
        assert!(is_image_response(&missing));
        assert!(is_image_response(&wrong));
    }

    #[test]
    fn test_error_status_is_never_valid() {
        let response = ProbeResponse {
            status: 404,
            content_type: Some("image/png".into()),
            body_prefix: PNG_PREFIX.to_vec(),
        };
        assert!(!is_image_response(&response));

        let not_modified = ProbeResponse { status: 304, content_type: Some("IMAGE/WEBP".into()), body_prefix: vec![] };
        assert!(is_image_response(&not_modified));
    }

    #[tokio::test]
    async fn test_twelve_candidates_run_in_three_batches() {
        let candidates = urls(12);
        let mut probe = MockProbe { delay_ms: 20, ..Default::default() };
        for url in &candidates {
            probe = probe.image(url);
        }
        let probe = Arc::new(probe);

        let validator = ExistenceValidator::new(probe.clone(), 5);
        let report = validator.validate_with_report(&candidates).await;

        let sizes: Vec<usize> = report.batches.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(report.valid, candidates);
        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 5);
        assert_eq!(probe.seen.lock().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_siblings() {
        let candidates = urls(12);
        let mut probe = MockProbe { delay_ms: 5, ..Default::default() };
        for url in &candidates {
            probe = probe.image(url);
        }
        let probe = Arc::new(probe.failing(&candidates[1]));

        let validator = ExistenceValidator::new(probe.clone(), 5);
        let report = validator.validate_with_report(&candidates).await;

        assert_eq!(report.batches[0], BatchSummary { index: 0, size: 5, valid: 4 });
        assert_eq!(report.valid.len(), 11);
        assert!(!report.valid.contains(&candidates[1]));
        assert!(report.valid.contains(&candidates[0]));
        assert!(report.valid.contains(&candidates[4]));
    }

    #[tokio::test]
    async fn test_all_batches_run_without_early_exit() {
        let candidates = urls(7);
        let probe = Arc::new(MockProbe::default().image(&candidates[0]));

        let validator = ExistenceValidator::new(probe.clone(), 3);
        let valid = validator.validate(&candidates).await;

        assert_eq!(valid, vec![candidates[0].clone()]);
        assert_eq!(probe.seen.lock().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let validator = ExistenceValidator::new(Arc::new(MockProbe::default()), 5);
        let report = validator.validate_with_report(&[]).await;
        assert!(report.valid.is_empty());
        assert!(report.batches.is_empty());
    }

    #[tokio::test]
    async fn test_reqwest_probe_sends_image_headers() {
        let server = MockServer::start();
        let origin = server.base_url();
        let image = server.mock(|when, then| {
            when.method(GET)
                .path("/img/shoe.png")
                .header("accept", IMAGE_ACCEPT)
                .header("origin", origin.as_str())
                .header("cache-control", "no-cache")
                .header_exists("user-agent");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body([PNG_PREFIX, &[0u8; 64][..]].concat());
        });
        server.mock(|when, then| {
            when.method(GET).path("/img/page.html");
            then.status(200).header("content-type", "text/html").body("<html></html>");
        });

        let probe = Arc::new(ReqwestProbe::new(&ValidationConfig::default(), &[]).unwrap());
        let response = probe.probe(&server.url("/img/shoe.png")).await.unwrap();
        image.assert();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_prefix.len(), 16);

        let validator = ExistenceValidator::new(probe, 5);
        let valid = validator
            .validate(&[server.url("/img/shoe.png"), server.url("/img/page.html"), server.url("/img/missing.jpg")])
            .await;
        assert_eq!(valid, vec![server.url("/img/shoe.png")]);
    }
}
