use crate::api::error::AppError;
use crate::backend::{Backend, BlobObject, FilePatch, NewFile};
use crate::models::{DeleteStatus, File, FileList, FileType, User};
use crate::services::query::build_query;
use crate::services::revalidation::Revalidator;
use crate::utils::file_type::{construct_file_url, get_file_type};
use crate::utils::validation::{normalize_emails, sanitize_filename, validate_file_size};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

pub struct UploadFile {
    pub filename: String,
    pub bytes: Bytes,
    pub owner_id: String,
    pub account_id: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct RenameFile {
    pub file_id: String,
    pub name: String,
    pub extension: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct UpdateFileUsers {
    pub file_id: String,
    pub emails: Vec<String>,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct DeleteFile {
    pub file_id: String,
    pub bucket_file_id: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct GetFiles {
    pub types: Vec<FileType>,
    pub search_text: String,
    pub sort: String,
    pub limit: Option<u64>,
}

/// The mutations a file's action menu can dispatch.
#[async_trait]
pub trait FileActions: Send + Sync {
    async fn rename_file(&self, args: RenameFile) -> Result<File, AppError>;
    async fn update_file_users(&self, args: UpdateFileUsers) -> Result<File, AppError>;
    async fn delete_file(&self, args: DeleteFile) -> Result<DeleteStatus, AppError>;
}

/// Upload, rename, share and delete. Each mutation touches the blob store and/or the
/// metadata store, then revalidates the path it was issued from.
#[derive(Clone)]
pub struct FileService {
    backend: Backend,
    revalidator: Arc<Revalidator>,
    public_base_url: String,
    max_file_size: usize,
}

impl FileService {
    pub fn new(
        backend: Backend,
        revalidator: Arc<Revalidator>,
        public_base_url: String,
        max_file_size: usize,
    ) -> Self {
        Self {
            backend,
            revalidator,
            public_base_url,
            max_file_size,
        }
    }

    pub fn revalidator(&self) -> &Revalidator {
        &self.revalidator
    }

    pub async fn upload_file(&self, args: UploadFile) -> Result<File, AppError> {
        let filename =
            sanitize_filename(&args.filename).map_err(|e| AppError::BadRequest(e.to_string()))?;
        if args.bytes.is_empty() {
            return Err(AppError::BadRequest("File is empty".to_string()));
        }
        validate_file_size(args.bytes.len(), self.max_file_size)
            .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;

        let blob_id = Uuid::new_v4().to_string();
        let blob = self
            .backend
            .blobs
            .create_file(&blob_id, &filename, args.bytes)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to upload file"))?;

        let (file_type, extension) = get_file_type(&blob.name);
        let record = NewFile {
            name: blob.name.clone(),
            extension,
            file_type,
            url: construct_file_url(&self.public_base_url, &blob.id),
            size: blob.size,
            owner_id: args.owner_id,
            account_id: args.account_id,
            bucket_file_id: blob.id.clone(),
        };

        let file = match self.backend.documents.create_file(record).await {
            Ok(file) => file,
            Err(e) => {
                if let Err(cleanup) = self.backend.blobs.delete_file(&blob.id).await {
                    tracing::warn!("Failed to remove orphan blob {}: {}", blob.id, cleanup);
                }
                return Err(AppError::PartialUpload(e).logged("Failed to create file document"));
            }
        };

        tracing::info!("✅ Uploaded {} ({} bytes) as {}", file.name, file.size, file.id);
        self.revalidator.revalidate_path(&args.path);
        Ok(file)
    }

    pub async fn rename_file(&self, args: RenameFile) -> Result<File, AppError> {
        let name = args.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name cannot be empty".to_string()));
        }
        let extension = args.extension.trim().trim_start_matches('.');
        let new_name = if extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, extension)
        };

        let file = self
            .backend
            .documents
            .update_file(
                &args.file_id,
                FilePatch {
                    name: Some(new_name),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AppError::from(e).logged("Failed to rename file"))?;

        self.revalidator.revalidate_path(&args.path);
        Ok(file)
    }

    /// Replaces the share list. Removing one user is resubmitting the list without them.
    pub async fn update_file_users(&self, args: UpdateFileUsers) -> Result<File, AppError> {
        let emails =
            normalize_emails(&args.emails).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let file = self
            .backend
            .documents
            .update_file(
                &args.file_id,
                FilePatch {
                    shared_user_emails: Some(emails),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AppError::from(e).logged("Failed to update file users"))?;

        self.revalidator.revalidate_path(&args.path);
        Ok(file)
    }

    /// Deletes the metadata record, then the blob. The blob is kept when the record
    /// could not be deleted.
    pub async fn delete_file(&self, args: DeleteFile) -> Result<DeleteStatus, AppError> {
        self.backend
            .documents
            .delete_file(&args.file_id)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to delete file"))?;

        self.backend
            .blobs
            .delete_file(&args.bucket_file_id)
            .await
            .map_err(|e| {
                AppError::from(e).logged(&format!(
                    "File {} deleted but blob {} was left behind",
                    args.file_id, args.bucket_file_id
                ))
            })?;

        tracing::info!("🗑️ Deleted file {}", args.file_id);
        self.revalidator.revalidate_path(&args.path);
        Ok(DeleteStatus::success())
    }

    pub async fn get_files(&self, current_user: &User, args: GetFiles) -> Result<FileList, AppError> {
        let query = build_query(
            current_user,
            &args.types,
            args.search_text.trim(),
            &args.sort,
            args.limit,
        );
        self.backend
            .documents
            .list_files(&query)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to get files"))
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, AppError> {
        self.backend
            .documents
            .get_file(file_id)
            .await
            .map_err(AppError::from)
    }

    /// Loads a file the caller may act on; files neither owned by nor shared with
    /// `current_user` are reported as missing.
    pub async fn get_visible_file(&self, current_user: &User, file_id: &str) -> Result<File, AppError> {
        let file = self.get_file(file_id).await?;
        if !file.is_visible_to(current_user) {
            return Err(AppError::NotFound(format!("file {}", file_id)));
        }
        Ok(file)
    }

    /// Loads the contents behind a view/download link, if the caller may see the file.
    pub async fn open_blob(
        &self,
        current_user: &User,
        bucket_file_id: &str,
    ) -> Result<(File, BlobObject), AppError> {
        let file = self
            .backend
            .documents
            .find_file_by_blob(bucket_file_id)
            .await?
            .filter(|f| f.is_visible_to(current_user))
            .ok_or_else(|| AppError::NotFound(format!("blob {}", bucket_file_id)))?;

        let blob = self
            .backend
            .blobs
            .get_file(&file.bucket_file_id)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to read file contents"))?;
        Ok((file, blob))
    }
}

#[async_trait]
impl FileActions for FileService {
    async fn rename_file(&self, args: RenameFile) -> Result<File, AppError> {
        FileService::rename_file(self, args).await
    }

    async fn update_file_users(&self, args: UpdateFileUsers) -> Result<File, AppError> {
        FileService::update_file_users(self, args).await
    }

    async fn delete_file(&self, args: DeleteFile) -> Result<DeleteStatus, AppError> {
        FileService::delete_file(self, args).await
    }
}
