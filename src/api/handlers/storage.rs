use crate::AppState;
use crate::api::error::AppError;
use crate::models::User;
use crate::utils::file_type::{content_type_for, is_active_content};
use axum::{
    Extension,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inline,
    Attachment,
}

fn content_disposition(filename: &str, disposition: Disposition) -> String {
    let ascii_filename: String = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();
    let disposition_type = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition_type, fallback_filename, encoded_filename
    )
}

async fn serve_blob(
    state: &AppState,
    user: &User,
    blob_id: &str,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let (file, blob) = state.files.open_blob(user, blob_id).await?;

    let disposition = if is_active_content(&file.extension) {
        Disposition::Attachment
    } else {
        disposition
    };
    let content_disposition = HeaderValue::from_str(&content_disposition(&file.name, disposition))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&file.extension)),
            ),
            (header::CONTENT_DISPOSITION, content_disposition),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=3600"),
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
            (
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("sandbox"),
            ),
        ],
        Body::from(blob.data),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/storage/{blob_id}/view",
    params(("blob_id" = String, Path, description = "Blob id")),
    responses(
        (status = 200, description = "File contents, inline"),
        (status = 404, description = "Blob not found or not visible"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "storage"
)]
pub async fn view_blob(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(blob_id): Path<String>,
) -> Result<Response, AppError> {
    serve_blob(&state, &user, &blob_id, Disposition::Inline).await
}

#[utoipa::path(
    get,
    path = "/storage/{blob_id}/download",
    params(("blob_id" = String, Path, description = "Blob id")),
    responses(
        (status = 200, description = "File contents, as attachment"),
        (status = 404, description = "Blob not found or not visible"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "storage"
)]
pub async fn download_blob(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(blob_id): Path<String>,
) -> Result<Response, AppError> {
    serve_blob(&state, &user, &blob_id, Disposition::Attachment).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("report.pdf", Disposition::Attachment),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report%2Epdf"
        );
        assert!(content_disposition("测试.txt", Disposition::Inline).starts_with("inline; filename=\".txt\""));
        assert!(content_disposition("测试", Disposition::Inline).contains("filename=\"file\""));
    }
}
