use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::info;

use crate::models::AppState;
use crate::storage::generate_object_name;
use crate::types::{AppError, AppResult, FileApiError, FileOperation};

/// Multipart field that carries the uploaded file.
const FILE_FIELD: &str = "file";

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        .route("/files/upload", post(upload_file).layer(upload_limit))
        .route("/files/download/{filename}", get(download_file))
        .route("/files/list", get(list_files))
        .route("/files/delete/{filename}", delete(delete_file))
        .route("/files/url/{filename}", get(file_url))
        .with_state(state)
}

/// POST /files/upload - store the `file` part under a generated name and
/// answer with a presigned download URL
async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, FileApiError> {
    store_upload(&state, multipart)
        .await
        .map_err(|e| FileApiError::new(FileOperation::Upload, e))
}

async fn store_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<String> {
    let mut multipart = multipart.map_err(|e| AppError::InvalidUpload(e.to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidUpload(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let content_type = match field.content_type() {
            Some(ct) => ct.to_string(),
            None => mime_guess::from_path(original_name.as_deref().unwrap_or_default())
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidUpload(e.to_string()))?;

        let object_name = generate_object_name(original_name.as_deref());
        let size = data.len();
        state
            .store
            .put_object(&object_name, data, &content_type)
            .await?;

        let url = state
            .store
            .presigned_get_url(&object_name, state.config.storage.presign_expiry())
            .await?;

        info!(
            object = %object_name,
            original = ?original_name,
            bytes = size,
            content_type = %content_type,
            "File uploaded"
        );
        return Ok(format!("File uploaded successfully! Download URL: {}", url));
    }

    Err(AppError::InvalidUpload(format!(
        "missing multipart field `{}`",
        FILE_FIELD
    )))
}

/// GET /files/download/{filename} - raw object bytes
async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, FileApiError> {
    let data = state
        .store
        .get_object(&filename)
        .await
        .map_err(|e| FileApiError::new(FileOperation::Download, e))?;

    info!(object = %filename, bytes = data.len(), "File downloaded");
    Ok((
        [(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())],
        data,
    ))
}

/// GET /files/list - every object name in the bucket
async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<String>>, FileApiError> {
    let names = state
        .store
        .list_objects()
        .await
        .map_err(|e| FileApiError::new(FileOperation::List, e))?;

    info!(count = names.len(), "Files listed");
    Ok(Json(names))
}

/// DELETE /files/delete/{filename}
async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<String, FileApiError> {
    state
        .store
        .delete_object(&filename)
        .await
        .map_err(|e| FileApiError::new(FileOperation::Delete, e))?;

    info!(object = %filename, "File deleted");
    Ok(format!("File deleted successfully: {}", filename))
}

/// GET /files/url/{filename} - presigned GET URL
async fn file_url(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<String, FileApiError> {
    state
        .store
        .presigned_get_url(&filename, state.config.storage.presign_expiry())
        .await
        .map_err(|e| FileApiError::new(FileOperation::Url, e))
}
