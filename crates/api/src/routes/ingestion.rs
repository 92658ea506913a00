//! Bulk Ingestion Pipeline routes (spec.md §4.3/§6).

use {
    crate::{ApiError, ApiResult, AppState, auth::AuthenticatedUser},
    axum::extract::{Multipart, Path, State},
    ingestion::ImportSummary,
    model::{ids::PropertyId, Error, Property},
    serde::Deserialize,
};

/// Accepts a scanned DA 2062 image plus a caller-chosen `form_id`, uploads
/// the image, calls the rate-limited OCR collaborator, and runs the
/// extraction/expansion/verification-gating pipeline (spec.md §4.3).
pub async fn upload_form(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    mut multipart: Multipart,
) -> ApiResult<ImportSummary> {
    let mut form_id: Option<String> = None;
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut content_type = "application/octet-stream".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from(Error::validation(e.to_string())))?
    {
        match field.name().unwrap_or_default() {
            "form_id" => {
                form_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::from(Error::validation(e.to_string())))?,
                );
            }
            "image" => {
                content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                image_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::from(Error::validation(e.to_string())))?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    let form_id = form_id.ok_or_else(|| ApiError::from(Error::validation("missing form_id field")))?;
    let image_bytes =
        image_bytes.ok_or_else(|| ApiError::from(Error::validation("missing image field")))?;

    let key = format!("forms/{form_id}.bin");
    state
        .uploader
        .put(&key, image_bytes, &content_type)
        .await
        .map_err(|e| ApiError::from(Error::Internal(e.into())))?;
    let image_url = state
        .uploader
        .url_for(&key)
        .await
        .map_err(|e| ApiError::from(Error::Internal(e.into())))?;

    let ocr_result =
        ingestion::ocr::recognize_rate_limited(state.ocr.as_ref(), &state.ocr_limiter, &image_url)
            .await?;

    let summary = ingestion::process_form(
        &state.pool,
        actor,
        state.catalog.as_ref(),
        &form_id,
        &image_url,
        ocr_result,
    )
    .await?;

    Ok(axum::Json(summary))
}

#[derive(Deserialize, Default)]
pub struct VerifyItemRequest {
    pub corrected_serial: Option<String>,
    pub corrected_nsn: Option<String>,
    pub notes: Option<String>,
}

pub async fn verify_item(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<PropertyId>,
    body: Option<axum::Json<VerifyItemRequest>>,
) -> ApiResult<Property> {
    let body = body.map(|b| b.0).unwrap_or_default();
    let property = ingestion::verify_item(
        &state.pool,
        actor,
        id,
        body.corrected_serial.as_deref(),
        body.corrected_nsn.as_deref(),
        body.notes,
    )
    .await?;
    Ok(axum::Json(property))
}

#[derive(serde::Serialize)]
pub struct DiscardFormResponse {
    pub discarded: usize,
}

pub async fn discard_form(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(form_id): Path<String>,
) -> ApiResult<DiscardFormResponse> {
    let discarded = ingestion::discard_form(&state.pool, actor, &form_id).await?;
    Ok(axum::Json(DiscardFormResponse { discarded }))
}
