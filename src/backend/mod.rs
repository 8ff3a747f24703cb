//! Collaborators the actions forward to: identity, document metadata and blob storage.
//!
//! The actions only ever see the traits below, bundled as [`Backend`]. Production wires
//! the sea-orm and S3 implementations, tests and `--backend memory` wire [`memory`].

pub mod memory;
pub mod s3;
pub mod sql;

use crate::models::{File, FileList, FileType, User};
use crate::services::query::FileQuery;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Session is invalid or expired")]
    InvalidSession,

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("OTP delivery failed: {0}")]
    Delivery(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Wrong passcodes tolerated before the pending token is discarded.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Account resolved from a session secret.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailToken {
    pub user_id: String,
}

/// A freshly created session. `secret` is only available here.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    pub account_id: String,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub extension: String,
    pub file_type: FileType,
    pub url: String,
    pub size: i64,
    pub owner_id: String,
    pub account_id: String,
    pub bucket_file_id: String,
}

/// Partial update of a file record; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub name: Option<String>,
    pub shared_user_emails: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub id: String,
    pub name: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct BlobObject {
    pub id: String,
    pub name: String,
    pub data: Bytes,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Issues a one-time passcode for `email`. Reuses the existing account for the
    /// address, otherwise creates one under `user_id`. Returns the account id.
    async fn create_email_token(&self, user_id: &str, email: &str) -> BackendResult<EmailToken>;
    /// Exchanges a passcode for a session.
    async fn create_session(&self, user_id: &str, secret: &str) -> BackendResult<Session>;
    async fn get_account(&self, session_secret: &str) -> BackendResult<Principal>;
    async fn delete_session(&self, session_secret: &str) -> BackendResult<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> BackendResult<User>;
    async fn find_user_by_email(&self, email: &str) -> BackendResult<Option<User>>;
    async fn find_user_by_account(&self, account_id: &str) -> BackendResult<Option<User>>;

    async fn create_file(&self, file: NewFile) -> BackendResult<File>;
    async fn get_file(&self, id: &str) -> BackendResult<File>;
    async fn find_file_by_blob(&self, bucket_file_id: &str) -> BackendResult<Option<File>>;
    async fn list_files(&self, query: &FileQuery) -> BackendResult<FileList>;
    async fn update_file(&self, id: &str, patch: FilePatch) -> BackendResult<File>;
    async fn delete_file(&self, id: &str) -> BackendResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_file(&self, id: &str, name: &str, data: Bytes) -> BackendResult<StoredBlob>;
    async fn delete_file(&self, id: &str) -> BackendResult<()>;
    async fn get_file(&self, id: &str) -> BackendResult<BlobObject>;
}

#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityService>,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            identity,
            documents,
            blobs,
        }
    }

    /// All three capabilities served by the same in-memory fake.
    pub fn in_memory(store: Arc<memory::MemoryBackend>) -> Self {
        Self {
            identity: store.clone(),
            documents: store.clone(),
            blobs: store,
        }
    }
}
