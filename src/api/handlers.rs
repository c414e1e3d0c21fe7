use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    AppState,
};

use super::responses::MatchResponse;

/// Handle one uploaded image: decode, embed, and scan the reference index
/// for the closest label.
///
/// The image bytes are taken from the multipart field named `file` and kept
/// only in memory for the duration of the request. Any decode or inference
/// failure surfaces as a single service-error response; nothing is retried.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<MatchResponse>> {
    let mut upload: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            upload = Some(field.bytes().await?);
        }
    }

    let bytes =
        upload.ok_or_else(|| AppError::UploadError("no \"file\" field in upload".to_string()))?;
    log::debug!("predict request with {} byte upload", bytes.len());

    let img = image::load_from_memory(&bytes)?;
    let embedding = state.encoder.embed(&img)?;
    let best = state.index.nearest(&embedding);

    let response = MatchResponse::from_scan(best);
    log::debug!(
        "match: {:?}, distance: {}",
        response.recognized_object,
        response.distance
    );

    Ok(Json(response))
}
