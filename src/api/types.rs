//! API request and response types.

use serde::Serialize;
use uuid::Uuid;

use crate::filters::{FieldError, FilterSummary};

/// Response after a completed analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    /// Identifier of the pipeline run
    pub run_id: Uuid,

    /// Final report (Markdown)
    pub report: String,

    /// Download URL when the report file is available
    pub download_url: Option<String>,

    /// Headline metrics of the filters used
    pub summary: FilterSummary,

    /// Non-fatal problems during the run
    pub warnings: Vec<String>,
}

/// Error body returned by the JSON endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error category
    pub kind: &'static str,

    /// Human readable message
    pub error: String,

    /// Per-field validation errors, if any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Credentials that still need to be configured
    pub missing_credentials: Vec<&'static str>,
}
