use super::{
    BackendError, BackendResult, BlobObject, BlobStore, DocumentStore, EmailToken, FilePatch,
    IdentityService, MAX_OTP_ATTEMPTS, NewFile, NewUser, Principal, Session, StoredBlob,
};
use crate::models::{File, FileList, User};
use crate::services::query::FileQuery;
use crate::utils::hash::{generate_otp, generate_secret};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Backend calls recorded by [`MemoryBackend`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateEmailToken { email: String },
    CreateSession { user_id: String },
    GetAccount,
    DeleteSession,
    CreateUser { email: String },
    FindUserByEmail { email: String },
    FindUserByAccount { account_id: String },
    CreateFileDocument { name: String },
    GetFileDocument { id: String },
    FindFileByBlob { bucket_file_id: String },
    ListFileDocuments,
    UpdateFileDocument { id: String },
    DeleteFileDocument { id: String },
    CreateBlob { id: String },
    DeleteBlob { id: String },
    GetBlob { id: String },
}

impl BackendCall {
    pub fn is_blob_call(&self) -> bool {
        matches!(
            self,
            BackendCall::CreateBlob { .. }
                | BackendCall::DeleteBlob { .. }
                | BackendCall::GetBlob { .. }
        )
    }
}

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub get_account: bool,
    pub delete_session: bool,
    pub create_file_document: bool,
    pub update_file_document: bool,
    pub delete_file_document: bool,
    pub list_file_documents: bool,
    pub create_blob: bool,
    pub delete_blob: bool,
}

struct Account {
    id: String,
    email: String,
}

struct PendingToken {
    code: String,
    expires_at: DateTime<Utc>,
    attempts: i32,
}

struct ActiveSession {
    account_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, PendingToken>,
    sessions: HashMap<String, ActiveSession>,
    issued_codes: HashMap<String, String>,
    users: Vec<User>,
    files: HashMap<String, File>,
    blobs: HashMap<String, (String, Bytes)>,
    calls: Vec<BackendCall>,
    recording: bool,
    failures: Failures,
}

impl State {
    fn record(&mut self, call: BackendCall) {
        if self.recording {
            self.calls.push(call);
        }
    }
}

/// Identity, documents and blobs held in process memory.
pub struct MemoryBackend {
    state: Mutex<State>,
    otp_ttl: Duration,
    session_ttl: Duration,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(op: &str) -> BackendError {
    BackendError::Unavailable(format!("injected failure: {}", op))
}

impl MemoryBackend {
    /// Default TTLs, recording calls and issued passcodes for inspection.
    pub fn new() -> Self {
        Self::with_ttls(Duration::minutes(15), Duration::days(30)).recording()
    }

    /// Records nothing beyond the data itself, as served by `--backend memory`.
    pub fn with_ttls(otp_ttl: Duration, session_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            otp_ttl,
            session_ttl,
        }
    }

    pub fn recording(self) -> Self {
        self.lock().recording = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail(&self, configure: impl FnOnce(&mut Failures)) {
        configure(&mut self.lock().failures);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Most recent passcode issued for `email`.
    pub fn last_otp(&self, email: &str) -> Option<String> {
        self.lock().issued_codes.get(email).cloned()
    }

    pub fn blob_ids(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    /// Seeds a file record as-is, timestamps included.
    pub fn insert_file(&self, file: File) {
        self.lock().files.insert(file.id.clone(), file);
    }

    pub fn insert_user(&self, user: User) {
        self.lock().users.push(user);
    }
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn create_email_token(&self, user_id: &str, email: &str) -> BackendResult<EmailToken> {
        let mut state = self.lock();
        state.record(BackendCall::CreateEmailToken {
            email: email.to_string(),
        });

        let existing = state
            .accounts
            .values()
            .find(|a| a.email == email)
            .map(|a| a.id.clone());
        let account_id = match existing {
            Some(id) => id,
            None => {
                state.accounts.insert(
                    user_id.to_string(),
                    Account {
                        id: user_id.to_string(),
                        email: email.to_string(),
                    },
                );
                user_id.to_string()
            }
        };

        let code = generate_otp();
        tracing::info!("📧 OTP for {}: {}", email, code);
        state.tokens.insert(
            account_id.clone(),
            PendingToken {
                code: code.clone(),
                expires_at: Utc::now() + self.otp_ttl,
                attempts: 0,
            },
        );
        if state.recording {
            state.issued_codes.insert(email.to_string(), code);
        }

        Ok(EmailToken {
            user_id: account_id,
        })
    }

    async fn create_session(&self, user_id: &str, secret: &str) -> BackendResult<Session> {
        let mut state = self.lock();
        state.record(BackendCall::CreateSession {
            user_id: user_id.to_string(),
        });

        let valid = state
            .tokens
            .get(user_id)
            .is_some_and(|t| t.code == secret && t.expires_at > Utc::now());
        if !valid {
            let locked = state.tokens.get_mut(user_id).is_some_and(|t| {
                t.attempts += 1;
                t.attempts >= MAX_OTP_ATTEMPTS
            });
            if locked {
                state.tokens.remove(user_id);
            }
            return Err(BackendError::InvalidCredentials(
                "Invalid or expired passcode".to_string(),
            ));
        }
        state.tokens.remove(user_id);

        let session_secret = generate_secret();
        let expires_at = Utc::now() + self.session_ttl;
        state.sessions.insert(
            session_secret.clone(),
            ActiveSession {
                account_id: user_id.to_string(),
                expires_at,
            },
        );

        Ok(Session {
            id: Uuid::new_v4().to_string(),
            secret: session_secret,
            expires_at,
        })
    }

    async fn get_account(&self, session_secret: &str) -> BackendResult<Principal> {
        let mut state = self.lock();
        state.record(BackendCall::GetAccount);
        if state.failures.get_account {
            return Err(injected("get_account"));
        }

        let session = state
            .sessions
            .get(session_secret)
            .filter(|s| s.expires_at > Utc::now())
            .ok_or(BackendError::InvalidSession)?;
        let account = state
            .accounts
            .get(&session.account_id)
            .ok_or(BackendError::InvalidSession)?;

        Ok(Principal {
            id: account.id.clone(),
            email: account.email.clone(),
        })
    }

    async fn delete_session(&self, session_secret: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.record(BackendCall::DeleteSession);
        if state.failures.delete_session {
            return Err(injected("delete_session"));
        }
        state
            .sessions
            .remove(session_secret)
            .map(|_| ())
            .ok_or(BackendError::InvalidSession)
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn create_user(&self, user: NewUser) -> BackendResult<User> {
        let mut state = self.lock();
        state.record(BackendCall::CreateUser {
            email: user.email.clone(),
        });

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4().to_string(),
            full_name: user.full_name,
            email: user.email,
            avatar_url: user.avatar_url,
            account_id: user.account_id,
            created_at: now,
            updated_at: now,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> BackendResult<Option<User>> {
        let mut state = self.lock();
        state.record(BackendCall::FindUserByEmail {
            email: email.to_string(),
        });
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_account(&self, account_id: &str) -> BackendResult<Option<User>> {
        let mut state = self.lock();
        state.record(BackendCall::FindUserByAccount {
            account_id: account_id.to_string(),
        });
        Ok(state
            .users
            .iter()
            .find(|u| u.account_id == account_id)
            .cloned())
    }

    async fn create_file(&self, file: NewFile) -> BackendResult<File> {
        let mut state = self.lock();
        state.record(BackendCall::CreateFileDocument {
            name: file.name.clone(),
        });
        if state.failures.create_file_document {
            return Err(injected("create_file_document"));
        }

        let now = Utc::now();
        let created = File {
            id: Uuid::new_v4().to_string(),
            name: file.name,
            extension: file.extension,
            file_type: file.file_type,
            url: file.url,
            size: file.size,
            owner_id: file.owner_id,
            account_id: file.account_id,
            shared_user_emails: Vec::new(),
            bucket_file_id: file.bucket_file_id,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_file(&self, id: &str) -> BackendResult<File> {
        let mut state = self.lock();
        state.record(BackendCall::GetFileDocument { id: id.to_string() });
        state
            .files
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("file {}", id)))
    }

    async fn find_file_by_blob(&self, bucket_file_id: &str) -> BackendResult<Option<File>> {
        let mut state = self.lock();
        state.record(BackendCall::FindFileByBlob {
            bucket_file_id: bucket_file_id.to_string(),
        });
        Ok(state
            .files
            .values()
            .find(|f| f.bucket_file_id == bucket_file_id)
            .cloned())
    }

    async fn list_files(&self, query: &FileQuery) -> BackendResult<FileList> {
        let mut state = self.lock();
        state.record(BackendCall::ListFileDocuments);
        if state.failures.list_file_documents {
            return Err(injected("list_file_documents"));
        }

        let (total, documents) = query.apply(state.files.values());
        Ok(FileList { total, documents })
    }

    async fn update_file(&self, id: &str, patch: FilePatch) -> BackendResult<File> {
        let mut state = self.lock();
        state.record(BackendCall::UpdateFileDocument { id: id.to_string() });
        if state.failures.update_file_document {
            return Err(injected("update_file_document"));
        }

        let file = state
            .files
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(format!("file {}", id)))?;
        if let Some(name) = patch.name {
            file.name = name;
        }
        if let Some(emails) = patch.shared_user_emails {
            file.shared_user_emails = emails;
        }
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn delete_file(&self, id: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.record(BackendCall::DeleteFileDocument { id: id.to_string() });
        if state.failures.delete_file_document {
            return Err(injected("delete_file_document"));
        }
        state
            .files
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("file {}", id)))
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn create_file(&self, id: &str, name: &str, data: Bytes) -> BackendResult<StoredBlob> {
        let mut state = self.lock();
        state.record(BackendCall::CreateBlob { id: id.to_string() });
        if state.failures.create_blob {
            return Err(injected("create_blob"));
        }

        let size = data.len() as i64;
        state
            .blobs
            .insert(id.to_string(), (name.to_string(), data));
        Ok(StoredBlob {
            id: id.to_string(),
            name: name.to_string(),
            size,
        })
    }

    async fn delete_file(&self, id: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.record(BackendCall::DeleteBlob { id: id.to_string() });
        if state.failures.delete_blob {
            return Err(injected("delete_blob"));
        }
        state
            .blobs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("blob {}", id)))
    }

    async fn get_file(&self, id: &str) -> BackendResult<BlobObject> {
        let mut state = self.lock();
        state.record(BackendCall::GetBlob { id: id.to_string() });
        let (name, data) = state
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("blob {}", id)))?;
        Ok(BlobObject {
            id: id.to_string(),
            name,
            data,
        })
    }
}
