use crate::AppState;
use crate::api::error::AppError;
use crate::models::{DeleteStatus, File, FileList, FileType, User};
use crate::services::file_service::{DeleteFile, GetFiles, RenameFile, UpdateFileUsers, UploadFile};
use crate::services::usage::{UsageCard, UsageTotals};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Response header carrying the revision of the path a mutation revalidated.
pub const PATH_REVISION_HEADER: &str = "x-path-revision";

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    /// Comma separated file types, e.g. `image,video`
    pub types: Option<String>,
    pub search_text: Option<String>,
    /// `field-direction`, e.g. `size-asc` or `$createdAt-desc`
    pub sort: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct RenameRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
    /// Defaults to the stored extension
    pub extension: Option<String>,
    #[serde(default)]
    pub path: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ShareRequest {
    pub emails: Vec<String>,
    #[serde(default)]
    pub path: String,
}

#[derive(Deserialize, IntoParams)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    #[serde(flatten)]
    pub totals: UsageTotals,
    pub summary: Vec<UsageCard>,
    pub percentage_used: f64,
}

fn parse_types(raw: Option<&str>) -> Result<Vec<FileType>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.parse::<FileType>().map_err(AppError::BadRequest))
        .collect()
}

fn revision_header(state: &AppState, path: &str) -> [(&'static str, String); 1] {
    [(
        PATH_REVISION_HEADER,
        state.revalidator.revision(path).to_string(),
    )]
}

#[utoipa::path(
    get,
    path = "/files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Files owned by or shared with the caller", body = FileList),
        (status = 401, description = "Not authenticated")
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileList>, AppError> {
    let args = GetFiles {
        types: parse_types(query.types.as_deref())?,
        search_text: query.search_text.unwrap_or_default(),
        sort: query.sort.unwrap_or_default(),
        limit: query.limit,
    };
    Ok(Json(state.files.get_files(&user, args).await?))
}

#[utoipa::path(
    post,
    path = "/files",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "`file` and the `path` to revalidate"
    ),
    responses(
        (status = 200, description = "File uploaded", body = File),
        (status = 400, description = "Missing or invalid file"),
        (status = 413, description = "File too large"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut path = String::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("File size limits exceeded".to_string())
        } else {
            AppError::BadRequest(format!("Multipart error: {}", e))
        }
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let data = field.bytes().await.map_err(|e| {
                    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
                        AppError::PayloadTooLarge("File size limits exceeded".to_string())
                    } else {
                        AppError::BadRequest(format!("Failed to read file: {}", e))
                    }
                })?;
                upload = Some((filename, data));
            }
            "path" => {
                path = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid path field: {}", e)))?;
            }
            _ => {}
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let file = state
        .files
        .upload_file(UploadFile {
            filename,
            bytes,
            owner_id: user.id.clone(),
            account_id: user.account_id.clone(),
            path: path.clone(),
        })
        .await?;

    Ok((revision_header(&state, &path), Json(file)))
}

#[utoipa::path(
    put,
    path = "/files/{id}/rename",
    params(("id" = String, Path, description = "File id")),
    request_body = RenameRequest,
    responses(
        (status = 200, description = "File renamed", body = File),
        (status = 404, description = "File not found"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "files"
)]
pub async fn rename_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let file = state.files.get_visible_file(&user, &id).await?;
    let renamed = state
        .files
        .rename_file(RenameFile {
            file_id: file.id,
            name: req.name,
            extension: req.extension.unwrap_or(file.extension),
            path: req.path.clone(),
        })
        .await?;

    Ok((revision_header(&state, &req.path), Json(renamed)))
}

#[utoipa::path(
    put,
    path = "/files/{id}/users",
    params(("id" = String, Path, description = "File id")),
    request_body = ShareRequest,
    responses(
        (status = 200, description = "Share list replaced", body = File),
        (status = 400, description = "Invalid email address"),
        (status = 404, description = "File not found"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "files"
)]
pub async fn update_file_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(req): Json<ShareRequest>,
) -> Result<impl IntoResponse, AppError> {
    let file = state.files.get_visible_file(&user, &id).await?;
    let updated = state
        .files
        .update_file_users(UpdateFileUsers {
            file_id: file.id,
            emails: req.emails,
            path: req.path.clone(),
        })
        .await?;

    Ok((revision_header(&state, &req.path), Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id"), PathQuery),
    responses(
        (status = 200, description = "File deleted", body = DeleteStatus),
        (status = 404, description = "File not found"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, AppError> {
    let file = state.files.get_visible_file(&user, &id).await?;
    let status = state
        .files
        .delete_file(DeleteFile {
            file_id: file.id,
            bucket_file_id: file.bucket_file_id,
            path: query.path.clone(),
        })
        .await?;

    Ok((revision_header(&state, &query.path), Json(status)))
}

#[utoipa::path(
    get,
    path = "/files/usage",
    responses(
        (status = 200, description = "Storage used by the caller's own files", body = UsageResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "files"
)]
pub async fn get_usage(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<UsageResponse>, AppError> {
    let totals = state.usage.compute_usage(&user).await?;
    Ok(Json(UsageResponse {
        summary: totals.summary(),
        percentage_used: totals.percentage_used(),
        totals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types() {
        assert!(parse_types(None).unwrap().is_empty());
        assert_eq!(
            parse_types(Some("image, video,")).unwrap(),
            vec![FileType::Image, FileType::Video]
        );
        assert!(matches!(
            parse_types(Some("image,zip")),
            Err(AppError::BadRequest(_))
        ));
    }
}
