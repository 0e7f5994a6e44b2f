//! Product Image Finder - locate real product photos for a shoe product page
//!
//! Given a product page URL (or a bare product code) this library:
//! - detects the brand and extracts the product code
//! - generates CDN candidate URLs from brand templates
//! - scrapes candidates from the rendered page
//! - clusters near-duplicates and keeps the highest resolution of each
//! - checks that the surviving URLs really serve an image

pub mod brand;
pub mod candidates;
pub mod cluster;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod scraper;
pub mod utils;
pub mod validator;

// Re-export main types for convenience
pub use crate::brand::Brand;
pub use crate::config::AppConfig;
pub use crate::core::{ImagePipeline, ValidatedImage};
pub use crate::error::{ImageFinderError, ImageFinderResult};
