use thiserror::Error;

/// Error types for the image discovery pipeline
#[derive(Error, Debug)]
pub enum ImageFinderError {
    // Input errors
    #[error("Invalid input: {input} ({reason})")]
    InvalidInput { input: String, reason: String },

    // Extraction errors
    #[error("No product code found in: {url}")]
    ExtractionFailed { url: String },

    // Network errors
    #[error("Page fetch failed: {url} - {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP request failed: {url} - {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    // Validation errors
    #[error("Image validation failed: {url} - {reason}")]
    Validation { url: String, reason: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ImageFinderError {
    /// Create an input error
    pub fn invalid_input(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput { input: input.into(), reason: reason.into() }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch { url: url.into(), message: message.into() }
    }

    /// Create a validation error
    pub fn validation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation { url: url.into(), reason: reason.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether the pipeline degrades around this error instead of surfacing it
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ExtractionFailed { .. } |
            Self::Fetch { .. } |
            Self::HttpStatus { .. } |
            Self::Network { .. } |
            Self::Timeout { .. } |
            Self::Validation { .. } => true,

            Self::InvalidInput { .. } |
            Self::Configuration { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "input",
            Self::ExtractionFailed { .. } => "extraction",
            Self::Fetch { .. } | Self::HttpStatus { .. } | Self::Network { .. } | Self::Timeout { .. } => "network",
            Self::Validation { .. } => "validation",
            Self::Configuration { .. } => "configuration",
        }
    }
}

/// Result type alias for the image finder
pub type ImageFinderResult<T> = std::result::Result<T, ImageFinderError>;

impl From<reqwest::Error> for ImageFinderError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if let Some(status) = err.status() {
            Self::HttpStatus { url, status: status.as_u16() }
        } else {
            Self::Network { message: err.to_string() }
        }
    }
}
