//! The OCR collaborator boundary (spec.md §1, §9). The vendor itself is out
//! of scope; this crate only defines the shape of its structured result and
//! a rate-limited call wrapper. Modeled as a trait so the pipeline's tests
//! never need a live vendor, mirroring `catalog::CatalogLookup` and
//! `notifications::PushSink`.

use async_trait::async_trait;

/// One OCR token with its position on the page, used for the line
/// aggregation stage (spec.md §4.3 step 1: "group OCR tokens into candidate
/// line-items by geometric proximity"). `y` is the token's vertical
/// position in page-relative units; tokens within `LINE_GAP` of each other
/// are considered the same line.
#[derive(Clone, Debug, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
}

/// The collaborator's structured result for one scanned form (spec.md
/// §4.3: "a reference to an uploaded image plus the collaborator OCR
/// service's structured result").
#[derive(Clone, Debug, Default)]
pub struct OcrFormResult {
    pub tokens: Vec<OcrToken>,
    /// Overall scan quality, independent of any one field's confidence.
    pub scan_confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("ocr vendor unavailable: {0}")]
    Unavailable(String),
}

/// The OCR vendor boundary (spec.md §9: "expose through explicit
/// dependencies, not ambient globals").
#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn recognize(&self, image_ref: &str) -> Result<OcrFormResult, OcrError>;
}

/// Calls `client.recognize` under the token-bucket limiter that guards
/// outbound OCR calls (spec.md §5). A rate-limited caller gets
/// `UpstreamUnavailable` rather than blocking, consistent with the crate's
/// `try_acquire` never blocking.
pub async fn recognize_rate_limited(
    client: &dyn OcrClient,
    limiter: &rate_limit::Limiter,
    image_ref: &str,
) -> model::Result<OcrFormResult> {
    limiter
        .try_acquire()
        .await
        .map_err(|e| model::Error::UpstreamUnavailable(e.to_string()))?;
    client
        .recognize(image_ref)
        .await
        .map_err(|e| model::Error::UpstreamUnavailable(e.to_string()))
}

/// A fixed-script fake for tests and for running the pipeline without a
/// configured vendor.
pub struct FakeOcrClient {
    pub result: OcrFormResult,
}

#[async_trait]
impl OcrClient for FakeOcrClient {
    async fn recognize(&self, _image_ref: &str) -> Result<OcrFormResult, OcrError> {
        Ok(self.result.clone())
    }
}
