use crate::error::AppError;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart},
};

pub const NO_FILE_UPLOADED: &str = "No file uploaded";

pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Reads the first multipart part named `field`. A request that is not
/// multipart at all is treated as having no file.
pub async fn take_file_field(
    multipart: Result<Multipart, MultipartRejection>,
    field: &str,
) -> Result<Upload, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected multipart body: {}", e);
        AppError::BadRequest(NO_FILE_UPLOADED.to_string())
    })?;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().map(str::to_owned);
        let bytes = part
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(Upload { file_name, bytes });
    }

    Err(AppError::BadRequest(NO_FILE_UPLOADED.to_string()))
}
