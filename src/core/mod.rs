use serde::{Deserialize, Serialize};

pub mod pipeline;

pub use pipeline::ImagePipeline;

use crate::brand::{Brand, ProductCode};

/// A candidate that passed the existence check in the current run.
///
/// `width` and `height` are configured placeholders, never measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedImage {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub alt: String,
}

/// Offline view of what the pipeline would probe for a page
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePlan {
    pub brand: Brand,
    pub code: Option<ProductCode>,
    pub generated: Vec<String>,
}
