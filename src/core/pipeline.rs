use std::sync::Arc;
use url::Url;

use super::{CandidatePlan, ValidatedImage};
use crate::brand::{Brand, BrandDetector, BrandProfile, BrandRegistry, GenerationContext, ProductCode};
use crate::candidates::CandidateGenerator;
use crate::cluster::SimilarityClusterer;
use crate::config::{AppConfig, PipelineConfig};
use crate::error::{ImageFinderError, ImageFinderResult};
use crate::logging::{LogContext, PerformanceLogger, RequestIdGenerator};
use crate::scraper::{HttpPageFetcher, PageContentExtractor, PageFetcher};
use crate::utils::{dedup_preserving_order, parse_page_url};
use crate::validator::{ExistenceValidator, HttpProbe, ReqwestProbe};
use crate::{log_debug, log_info, log_warn};

/// Where page candidates come from for one run
enum PageSource<'a> {
    Fetch,
    Rendered(&'a str),
    Skip,
}

/// End-to-end "product page or code -> validated images" workflow
pub struct ImagePipeline {
    detector: BrandDetector,
    registry: BrandRegistry,
    generator: CandidateGenerator,
    extractor: PageContentExtractor,
    clusterer: SimilarityClusterer,
    validator: ExistenceValidator,
    fetcher: Arc<dyn PageFetcher>,
    settings: PipelineConfig,
}

impl ImagePipeline {
    /// Pipeline with the HTTP page fetcher and image probe
    pub fn new(config: &AppConfig) -> ImageFinderResult<Self> {
        let fetcher = Arc::new(HttpPageFetcher::new(&config.http)?);
        let probe = Arc::new(ReqwestProbe::new(&config.validation, &config.http.user_agents)?);
        Ok(Self::with_collaborators(config, fetcher, probe))
    }

    /// Pipeline over caller-supplied I/O collaborators
    pub fn with_collaborators(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        probe: Arc<dyn HttpProbe>,
    ) -> Self {
        Self {
            detector: BrandDetector::new(),
            registry: BrandRegistry::new(),
            generator: CandidateGenerator::new(config.pipeline.max_generated_candidates),
            extractor: PageContentExtractor::new(),
            clusterer: SimilarityClusterer::new(),
            validator: ExistenceValidator::new(probe, config.validation.batch_size),
            fetcher,
            settings: config.pipeline.clone(),
        }
    }

    /// Validated images for a product page, fetching the page itself.
    ///
    /// Only malformed input is an error; no images is an empty list.
    pub async fn get_images(&self, page_url: &str) -> ImageFinderResult<Vec<ValidatedImage>> {
        let url = parse_page_url(page_url)?;
        let source = if self.settings.scrape_page {
            PageSource::Fetch
        } else {
            PageSource::Skip
        };
        Ok(self.run_for_page(&url, source).await)
    }

    /// Same as [`get_images`](Self::get_images) over HTML rendered elsewhere
    pub async fn get_images_from_html(
        &self,
        page_url: &str,
        html: &str,
    ) -> ImageFinderResult<Vec<ValidatedImage>> {
        let url = parse_page_url(page_url)?;
        Ok(self.run_for_page(&url, PageSource::Rendered(html)).await)
    }

    /// Generate, cluster and validate for a bare product code
    pub async fn images_for_code(&self, raw_code: &str, brand: Brand) -> ImageFinderResult<Vec<ValidatedImage>> {
        let code = ProductCode::normalize(raw_code)
            .ok_or_else(|| ImageFinderError::invalid_input(raw_code, "product code has no alphanumerics"))?;

        let profile = self.registry.profile(brand);
        let context = LogContext::new("pipeline", "images_for_code")
            .with_request_id(RequestIdGenerator::generate())
            .with_brand(brand.name())
            .with_string_field("code", code.as_str());

        let generated = self.generate(profile.as_ref(), &code, &GenerationContext::default(), &context);
        Ok(self
            .select_and_validate(profile.as_ref(), generated, Vec::new(), code.as_str(), &context)
            .await)
    }

    /// Brand, code and generated candidates for a page, without any network I/O
    pub fn plan_candidates(&self, page_url: &str) -> ImageFinderResult<CandidatePlan> {
        let url = parse_page_url(page_url)?;
        let brand = self.detector.detect(url.as_str());
        let profile = self.registry.profile(brand);
        let code = profile.extract_code(url.as_str());

        let generated = code
            .as_ref()
            .map(|c| self.generator.generate(profile.as_ref(), c, &GenerationContext::for_page(&url)))
            .unwrap_or_default();

        Ok(CandidatePlan { brand, code, generated })
    }

    async fn run_for_page(&self, url: &Url, source: PageSource<'_>) -> Vec<ValidatedImage> {
        let brand = self.detector.detect(url.as_str());
        let profile = self.registry.profile(brand);
        let context = LogContext::new("pipeline", "get_images")
            .with_request_id(RequestIdGenerator::generate())
            .with_url(url.as_str())
            .with_brand(brand.name());

        let code = profile.extract_code(url.as_str());
        let generated = match &code {
            Some(code) => self.generate(profile.as_ref(), code, &GenerationContext::for_page(url), &context),
            None => {
                let err = ImageFinderError::ExtractionFailed { url: url.to_string() };
                let warn_context = context.clone().with_error_category(err.category());
                log_warn!(warn_context, err, "Continuing with page candidates only");
                Vec::new()
            }
        };

        let scraped = self.scrape(profile.as_ref(), url, source, &context).await;

        let label = code
            .as_ref()
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| brand.name().to_string());
        self.select_and_validate(profile.as_ref(), generated, scraped, &label, &context)
            .await
    }

    fn generate(
        &self,
        profile: &dyn BrandProfile,
        code: &ProductCode,
        generation: &GenerationContext,
        context: &LogContext,
    ) -> Vec<String> {
        let perf = PerformanceLogger::new(context.clone().with_string_field("stage", "generate"));
        let generated = self.generator.generate(profile, code, generation);
        perf.finish_with_count("Generated candidates", "candidates", generated.len());
        generated
    }

    async fn scrape(
        &self,
        profile: &dyn BrandProfile,
        url: &Url,
        source: PageSource<'_>,
        context: &LogContext,
    ) -> Vec<String> {
        let perf = PerformanceLogger::new(context.clone().with_string_field("stage", "scrape"));
        let scraped = match source {
            PageSource::Fetch => {
                self.extractor
                    .fetch_and_extract(self.fetcher.as_ref(), profile, url)
                    .await
            }
            PageSource::Rendered(html) => self.extractor.extract(profile, html, url),
            PageSource::Skip => {
                log_debug!(context, "Page scraping disabled");
                Vec::new()
            }
        };
        perf.finish_with_count("Scraped page candidates", "candidates", scraped.len());
        scraped
    }

    /// Union, cluster, validate representatives, label survivors
    async fn select_and_validate(
        &self,
        profile: &dyn BrandProfile,
        generated: Vec<String>,
        scraped: Vec<String>,
        label: &str,
        context: &LogContext,
    ) -> Vec<ValidatedImage> {
        let candidates = dedup_preserving_order(generated.into_iter().chain(scraped));
        if candidates.is_empty() {
            let empty_context = context.clone().with_status("empty");
            log_info!(empty_context, "No candidates found");
            return Vec::new();
        }

        let perf = PerformanceLogger::new(context.clone().with_string_field("stage", "cluster"));
        let representatives = self.clusterer.representatives(&candidates, profile);
        perf.finish_with_count("Clustered candidates", "representatives", representatives.len());

        let perf = PerformanceLogger::new(context.clone().with_string_field("stage", "validate"));
        let valid = self.validator.validate(&representatives).await;
        perf.finish_with_count("Validated representatives", "valid", valid.len());

        let images: Vec<ValidatedImage> = valid
            .into_iter()
            .enumerate()
            .map(|(i, src)| ValidatedImage {
                src,
                width: self.settings.placeholder_width,
                height: self.settings.placeholder_height,
                alt: format!("{} product image {}", label, i + 1),
            })
            .collect();

        let done_context = context.clone().with_status("ok").with_count("images", images.len());
        log_info!(done_context, "Image discovery finished");
        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::StaticPageFetcher;
    use crate::validator::ProbeResponse;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Image for listed URLs, 404 for everything else
    #[derive(Default)]
    struct ListProbe {
        images: HashSet<String>,
        probed: Mutex<Vec<String>>,
    }

    impl ListProbe {
        fn new(images: &[&str]) -> Self {
            Self {
                images: images.iter().map(|s| s.to_string()).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpProbe for ListProbe {
        async fn probe(&self, url: &str) -> ImageFinderResult<ProbeResponse> {
            self.probed.lock().unwrap().push(url.to_string());
            if self.images.contains(url) {
                Ok(ProbeResponse { status: 200, content_type: None, body_prefix: vec![0xFF, 0xD8, 0xFF, 0xDB] })
            } else {
                Ok(ProbeResponse { status: 404, content_type: Some("text/html".into()), body_prefix: Vec::new() })
            }
        }
    }

    /// Always fails and counts calls
    #[derive(Default)]
    struct DownFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for DownFetcher {
        async fn fetch(&self, url: &Url) -> ImageFinderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ImageFinderError::Timeout { url: url.to_string() })
        }
    }

    const ASICS_PAGE: &str = "https://www.asics.com/us/en-us/gel-kayano-30/p/ANA_1203A474-002.html";
    const SR_RT_ZOOM: &str = "https://images.asics.com/is/image/asics/1203A474_002_SR_RT_GLB?$zoom$";
    const SB_FR_ZOOM: &str = "https://images.asics.com/is/image/asics/1203A474_002_SB_FR_GLB?$zoom$";
    const HERO: &str = "https://www.asics.com/on/demandware.static/hero.jpg";

    fn asics_html() -> String {
        format!(
            r#"<html><head><meta property="og:image" content="{}"></head><body>
            <div class="product-images"><img src="https://images.asics.com/is/image/asics/1203A474_002_SB_FR_GLB?wid=900&hei=900"></div>
            </body></html>"#,
            HERO
        )
    }

    #[tokio::test]
    async fn test_end_to_end_known_brand() {
        let probe = Arc::new(ListProbe::new(&[SR_RT_ZOOM, SB_FR_ZOOM, HERO]));
        let fetcher = Arc::new(StaticPageFetcher::serving(asics_html()));
        let pipeline = ImagePipeline::with_collaborators(&AppConfig::default(), fetcher, probe.clone());

        let images = pipeline.get_images(ASICS_PAGE).await.unwrap();
        let srcs: Vec<&str> = images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(srcs, vec![SR_RT_ZOOM, SB_FR_ZOOM, HERO]);

        assert_eq!(images[0].alt, "1203A474_002 product image 1");
        assert_eq!(images[2].alt, "1203A474_002 product image 3");
        assert!(images.iter().all(|i| i.width == 800 && i.height == 800));

        // every returned src was probed during this run
        let probed = probe.probed.lock().unwrap();
        assert!(srcs.iter().all(|src| probed.iter().any(|p| p == src)));
    }

    #[tokio::test]
    async fn test_output_src_values_are_distinct() {
        let probe = Arc::new(ListProbe::new(&[SR_RT_ZOOM, SB_FR_ZOOM, HERO]));
        let pipeline = ImagePipeline::with_collaborators(
            &AppConfig::default(),
            Arc::new(StaticPageFetcher::new()),
            probe,
        );

        let html = format!("{}<img src=\"{}\"><img src=\"{}\">", asics_html(), SR_RT_ZOOM, HERO);
        let images = pipeline.get_images_from_html(ASICS_PAGE, &html).await.unwrap();

        let unique: HashSet<&str> = images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(unique.len(), images.len());
        assert_eq!(images.len(), 3);
    }

    #[tokio::test]
    async fn test_no_code_and_empty_page_is_empty_not_error() {
        let probe = Arc::new(ListProbe::default());
        let pipeline = ImagePipeline::with_collaborators(
            &AppConfig::default(),
            Arc::new(StaticPageFetcher::serving("")),
            probe.clone(),
        );

        let images = pipeline.get_images("https://shop.example.com/about-us").await.unwrap();
        assert!(images.is_empty());
        assert!(probe.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_url_is_input_error() {
        let pipeline = ImagePipeline::with_collaborators(
            &AppConfig::default(),
            Arc::new(StaticPageFetcher::new()),
            Arc::new(ListProbe::default()),
        );

        let err = pipeline.get_images("not a url").await.unwrap_err();
        assert!(matches!(err, ImageFinderError::InvalidInput { .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_generated_candidates() {
        let fetcher = Arc::new(DownFetcher::default());
        let probe = Arc::new(ListProbe::new(&[SR_RT_ZOOM]));
        let pipeline = ImagePipeline::with_collaborators(&AppConfig::default(), fetcher.clone(), probe);

        let images = pipeline.get_images(ASICS_PAGE).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].src, SR_RT_ZOOM);
    }

    #[tokio::test]
    async fn test_scraping_can_be_disabled() {
        let mut config = AppConfig::default();
        config.pipeline.scrape_page = false;
        let fetcher = Arc::new(DownFetcher::default());
        let pipeline = ImagePipeline::with_collaborators(&config, fetcher.clone(), Arc::new(ListProbe::default()));

        let images = pipeline.get_images(ASICS_PAGE).await.unwrap();
        assert!(images.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_images_for_code() {
        let zoom = "https://secure-images.nike.com/is/image/DotCom/DV3853_001_A_PREM?$PDP_ZOOM$";
        let pipeline = ImagePipeline::with_collaborators(
            &AppConfig::default(),
            Arc::new(StaticPageFetcher::new()),
            Arc::new(ListProbe::new(&[zoom])),
        );

        let images = pipeline.images_for_code("dv3853-001", Brand::Nike).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].src, zoom);
        assert_eq!(images[0].alt, "DV3853_001 product image 1");

        let err = pipeline.images_for_code("--", Brand::Nike).await.unwrap_err();
        assert_eq!(err.category(), "input");
    }

    #[test]
    fn test_plan_candidates_without_network() {
        let mut config = AppConfig::default();
        config.pipeline.max_generated_candidates = Some(10);
        let pipeline = ImagePipeline::with_collaborators(
            &config,
            Arc::new(DownFetcher::default()),
            Arc::new(ListProbe::default()),
        );

        let plan = pipeline.plan_candidates(ASICS_PAGE).unwrap();
        assert_eq!(plan.brand, Brand::Asics);
        assert_eq!(plan.code.unwrap().as_str(), "1203A474_002");
        assert_eq!(plan.generated.len(), 10);
        assert_eq!(plan.generated[0], SR_RT_ZOOM);
    }
}
