use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use scraper::Html;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub mod extract;
pub mod rate_limiter;
pub mod user_agent;

use crate::brand::BrandProfile;
use crate::config::HttpConfig;
use crate::error::{ImageFinderError, ImageFinderResult};
use rate_limiter::RateLimiter;
use user_agent::UserAgentRotator;

/// Source of rendered product page HTML.
///
/// Failures surface as `Fetch`, `HttpStatus`, `Timeout` or `Network` errors;
/// the pipeline treats any of them as a page without candidates.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> ImageFinderResult<String>;
}

/// Fetches pages over HTTP with browser-like headers and per-domain pacing
pub struct HttpPageFetcher {
    client: Client,
    user_agents: UserAgentRotator,
    rate_limiter: RateLimiter,
}

impl HttpPageFetcher {
    pub fn new(config: &HttpConfig) -> ImageFinderResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"));
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert("DNT", HeaderValue::from_static("1"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ImageFinderError::config(format!("failed to build page client: {}", e)))?;

        info!("Page fetcher initialized");

        Ok(Self {
            client,
            user_agents: UserAgentRotator::new(&config.user_agents),
            rate_limiter: RateLimiter::new(Duration::from_millis(config.domain_delay_ms)),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> ImageFinderResult<String> {
        let start_time = Instant::now();
        self.rate_limiter.wait_for_domain(url.host_str().unwrap_or("")).await;

        let response = self
            .client
            .get(url.as_str())
            .header("User-Agent", self.user_agents.random())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageFinderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(
            "Fetched {} ({} bytes) in {}ms",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body)
    }
}

/// Serves HTML that was rendered elsewhere (headless browser, saved file)
#[derive(Debug, Clone, Default)]
pub struct StaticPageFetcher {
    pages: HashMap<String, String>,
    fallback: Option<String>,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same document for every URL
    pub fn serving(html: impl Into<String>) -> Self {
        Self {
            pages: HashMap::new(),
            fallback: Some(html.into()),
        }
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        let key = Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string());
        self.pages.insert(key, html.into());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch(&self, url: &Url) -> ImageFinderResult<String> {
        self.pages
            .get(url.as_str())
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ImageFinderError::fetch(url.as_str(), "no rendered HTML supplied"))
    }
}

/// Turns product pages into candidate image URLs via a brand profile
#[derive(Debug, Clone, Default)]
pub struct PageContentExtractor;

impl PageContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Candidates from already rendered HTML
    pub fn extract(&self, profile: &dyn BrandProfile, html: &str, page_url: &Url) -> Vec<String> {
        if html.trim().is_empty() {
            return Vec::new();
        }
        let document = Html::parse_document(html);
        profile.scrape_page(&document, page_url)
    }

    /// Fetch then extract; a failed fetch yields no candidates
    pub async fn fetch_and_extract(
        &self,
        fetcher: &dyn PageFetcher,
        profile: &dyn BrandProfile,
        page_url: &Url,
    ) -> Vec<String> {
        match fetcher.fetch(page_url).await {
            Ok(html) => self.extract(profile, &html, page_url),
            Err(e) => {
                warn!("Page fetch failed for {}: {}", page_url, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::{Brand, BrandRegistry};
    use httpmock::prelude::*;

    fn test_http_config() -> HttpConfig {
        HttpConfig {
            request_timeout_seconds: 5,
            connect_timeout_seconds: 5,
            max_redirects: 3,
            domain_delay_ms: 0,
            ..HttpConfig::default()
        }
    }

    #[tokio::test]
    async fn test_http_fetcher_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/p/1").header_exists("user-agent");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><body><img src='/a.jpg'></body></html>");
        });

        let fetcher = HttpPageFetcher::new(&test_http_config()).unwrap();
        let url = Url::parse(&server.url("/p/1")).unwrap();
        let html = fetcher.fetch(&url).await.unwrap();

        mock.assert();
        assert!(html.contains("a.jpg"));
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_non_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let fetcher = HttpPageFetcher::new(&test_http_config()).unwrap();
        let url = Url::parse(&server.url("/missing")).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();

        assert!(matches!(err, ImageFinderError::HttpStatus { status: 404, .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticPageFetcher::new().with_page("https://shop.example.com/p/1", "<p>hi</p>");
        let known = Url::parse("https://shop.example.com/p/1").unwrap();
        let unknown = Url::parse("https://shop.example.com/p/2").unwrap();

        assert_eq!(fetcher.fetch(&known).await.unwrap(), "<p>hi</p>");
        assert!(matches!(fetcher.fetch(&unknown).await, Err(ImageFinderError::Fetch { .. })));

        let serving = StaticPageFetcher::serving("<p>any</p>");
        assert_eq!(serving.fetch(&unknown).await.unwrap(), "<p>any</p>");
    }

    #[tokio::test]
    async fn test_failed_fetch_degrades_to_empty() {
        let registry = BrandRegistry::new();
        let profile = registry.profile(Brand::Unknown);
        let url = Url::parse("https://shop.example.com/p/1").unwrap();

        let urls = PageContentExtractor::new()
            .fetch_and_extract(&StaticPageFetcher::new(), profile.as_ref(), &url)
            .await;
        assert!(urls.is_empty());
    }

    #[test]
    fn test_extract_uses_brand_gallery() {
        let registry = BrandRegistry::new();
        let asics = registry.profile(Brand::Asics);
        let html = r#"<div class="product-images"><img src="https://images.asics.com/is/image/asics/1203A474_002_SR_RT_GLB"></div>"#;
        let url = Url::parse("https://www.asics.com/p/ANA_1203A474-002.html").unwrap();

        let urls = PageContentExtractor::new().extract(asics.as_ref(), html, &url);
        assert_eq!(urls, vec!["https://images.asics.com/is/image/asics/1203A474_002_SR_RT_GLB"]);
    }
}
