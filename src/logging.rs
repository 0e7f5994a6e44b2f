use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub json_format: bool,
    pub max_files: usize,
    pub log_directory: PathBuf,
    pub include_spans: bool,
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            console_enabled: true,
            json_format: false,
            max_files: 5,
            log_directory: PathBuf::from("logs"),
            include_spans: false,
            include_targets: true,
        }
    }
}

/// Initialize logging system
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let span_events = if config.include_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    // Console goes to stderr so stdout stays clean for results
    if config.console_enabled {
        let console_layer = fmt::layer()
            .with_target(config.include_targets)
            .with_span_events(span_events.clone())
            .with_writer(std::io::stderr)
            .boxed();

        layers.push(console_layer);
    }

    if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("product-image-finder")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_directory)?;

        let file_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_thread_ids(true)
                .with_target(config.include_targets)
                .with_span_events(span_events)
                .with_writer(file_appender)
                .boxed()
        } else {
            fmt::layer()
                .with_ansi(false)
                .with_target(config.include_targets)
                .with_span_events(span_events)
                .with_writer(file_appender)
                .boxed()
        };

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_enabled {
        info!("Log directory: {}", config.log_directory.display());
    }

    Ok(())
}

/// Structured logging context
#[derive(Debug, Clone, Serialize)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub request_id: Option<String>,
    pub url: Option<String>,
    pub brand: Option<String>,
    pub duration_ms: Option<u64>,
    pub status: Option<String>,
    pub error_category: Option<String>,
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl LogContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            request_id: None,
            url: None,
            brand: None,
            duration_ms: None,
            status: None,
            error_category: None,
            additional_fields: HashMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_error_category(mut self, category: impl Into<String>) -> Self {
        self.error_category = Some(category.into());
        self
    }

    pub fn with_string_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_fields.insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    pub fn with_count(mut self, key: impl Into<String>, value: usize) -> Self {
        self.additional_fields.insert(key.into(), serde_json::Value::Number((value as u64).into()));
        self
    }
}

/// Structured logging macros
#[macro_export]
macro_rules! log_info {
    ($context:expr, $message:expr) => {
        tracing::info!(
            component = %$context.component,
            operation = %$context.operation,
            request_id = ?$context.request_id,
            url = ?$context.url,
            brand = ?$context.brand,
            duration_ms = ?$context.duration_ms,
            status = ?$context.status,
            additional_fields = ?$context.additional_fields,
            $message
        );
    };
}

#[macro_export]
macro_rules! log_warn {
    ($context:expr, $message:expr) => {
        tracing::warn!(
            component = %$context.component,
            operation = %$context.operation,
            request_id = ?$context.request_id,
            url = ?$context.url,
            brand = ?$context.brand,
            status = ?$context.status,
            error_category = ?$context.error_category,
            additional_fields = ?$context.additional_fields,
            $message
        );
    };

    ($context:expr, $error:expr, $message:expr) => {
        tracing::warn!(
            component = %$context.component,
            operation = %$context.operation,
            request_id = ?$context.request_id,
            url = ?$context.url,
            brand = ?$context.brand,
            status = ?$context.status,
            error_category = ?$context.error_category,
            additional_fields = ?$context.additional_fields,
            error = %$error,
            $message
        );
    };
}

#[macro_export]
macro_rules! log_debug {
    ($context:expr, $message:expr) => {
        tracing::debug!(
            component = %$context.component,
            operation = %$context.operation,
            request_id = ?$context.request_id,
            additional_fields = ?$context.additional_fields,
            $message
        );
    };
}

/// Times one pipeline stage and logs the outcome when finished
pub struct PerformanceLogger {
    context: LogContext,
    start_time: std::time::Instant,
}

impl PerformanceLogger {
    pub fn new(context: LogContext) -> Self {
        Self {
            context,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn finish_with_count(self, message: &str, key: &str, count: usize) {
        let context = self.context
            .with_duration(self.start_time.elapsed())
            .with_count(key, count);
        tracing::info!(
            component = %context.component,
            operation = %context.operation,
            request_id = ?context.request_id,
            url = ?context.url,
            brand = ?context.brand,
            duration_ms = ?context.duration_ms,
            additional_fields = ?context.additional_fields,
            "{}", message
        );
    }
}

/// Request ID generation for correlating one pipeline run
pub struct RequestIdGenerator;

impl RequestIdGenerator {
    pub fn generate() -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let timestamp = chrono::Utc::now().timestamp_millis();
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

        format!("req-{}-{:04}", timestamp, counter % 10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("pipeline", "get_images")
            .with_request_id("req-123")
            .with_url("https://www.asics.com/p/ANA_1203A474-002.html")
            .with_brand("asics")
            .with_count("candidates", 42);

        assert_eq!(context.component, "pipeline");
        assert_eq!(context.operation, "get_images");
        assert_eq!(context.request_id, Some("req-123".to_string()));
        assert_eq!(context.brand.as_deref(), Some("asics"));
        assert_eq!(context.additional_fields.get("candidates"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestIdGenerator::generate();
        let id2 = RequestIdGenerator::generate();

        assert_ne!(id1, id2);
        assert!(id1.starts_with("req-"));
    }
}
