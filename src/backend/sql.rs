use super::{
    BackendError, BackendResult, DocumentStore, EmailToken, FilePatch, IdentityService,
    MAX_OTP_ATTEMPTS, NewFile, NewUser, Principal, Session,
};
use crate::entities::{accounts, email_tokens, file_shares, files, prelude::*, sessions, users};
use crate::models::{File, FileList, User};
use crate::services::mailer::OtpMailer;
use crate::services::query::{FileQuery, SortDirection, SortField, Visibility};
use crate::utils::hash::{calculate_hash, generate_otp, generate_secret};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::sea_query::{Expr, LikeExpr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Identity and document metadata persisted through sea-orm.
pub struct SqlBackend {
    db: DatabaseConnection,
    mailer: Arc<dyn OtpMailer>,
    otp_ttl: Duration,
    session_ttl: Duration,
}

impl SqlBackend {
    pub fn new(
        db: DatabaseConnection,
        mailer: Arc<dyn OtpMailer>,
        otp_ttl: Duration,
        session_ttl: Duration,
    ) -> Self {
        Self {
            db,
            mailer,
            otp_ttl,
            session_ttl,
        }
    }

    async fn shares_for<C: ConnectionTrait>(
        conn: &C,
        file_ids: &[String],
    ) -> BackendResult<HashMap<String, Vec<String>>> {
        let mut shares: HashMap<String, Vec<String>> = HashMap::new();
        if file_ids.is_empty() {
            return Ok(shares);
        }

        let rows = FileShares::find()
            .filter(file_shares::Column::FileId.is_in(file_ids.iter().cloned()))
            .order_by_asc(file_shares::Column::Position)
            .all(conn)
            .await?;
        for row in rows {
            shares.entry(row.file_id).or_default().push(row.email);
        }
        Ok(shares)
    }

    async fn with_shares<C: ConnectionTrait>(conn: &C, model: files::Model) -> BackendResult<File> {
        let mut shares = Self::shares_for(conn, std::slice::from_ref(&model.id)).await?;
        let emails = shares.remove(&model.id).unwrap_or_default();
        Ok(model.into_file(emails))
    }
}

fn hash_otp(code: &str) -> BackendResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| BackendError::Unavailable(format!("passcode hashing failed: {}", e)))
}

fn verify_otp(code: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(code.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Translates a [`FileQuery`] into a filter over the `files` table.
fn file_condition(query: &FileQuery) -> Condition {
    let visibility = match &query.visibility {
        Visibility::OwnedOrSharedWith { user_id, email } => Condition::any()
            .add(files::Column::OwnerId.eq(user_id.as_str()))
            .add(
                files::Column::Id.in_subquery(
                    Query::select()
                        .column(file_shares::Column::FileId)
                        .from(file_shares::Entity)
                        .and_where(file_shares::Column::Email.eq(email.as_str()))
                        .to_owned(),
                ),
            ),
        Visibility::OwnedBy(user_id) => {
            Condition::all().add(files::Column::OwnerId.eq(user_id.as_str()))
        }
    };

    let mut condition = Condition::all().add(visibility);

    if !query.types.is_empty() {
        condition = condition.add(files::Column::FileType.is_in(query.types.iter().map(|t| t.as_str())));
    }

    if let Some(text) = &query.search_text {
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        condition = condition.add(
            Expr::col(files::Column::SearchName).like(LikeExpr::new(pattern).escape('\\')),
        );
    }

    condition
}

fn sort_column(field: SortField) -> files::Column {
    match field {
        SortField::CreatedAt => files::Column::CreatedAt,
        SortField::UpdatedAt => files::Column::UpdatedAt,
        SortField::Name => files::Column::Name,
        SortField::Size => files::Column::Size,
    }
}

#[async_trait]
impl IdentityService for SqlBackend {
    async fn create_email_token(&self, user_id: &str, email: &str) -> BackendResult<EmailToken> {
        let existing = Accounts::find()
            .filter(accounts::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        let account_id = match existing {
            Some(account) => account.id,
            None => {
                let account = accounts::ActiveModel {
                    id: Set(user_id.to_string()),
                    email: Set(email.to_string()),
                    created_at: Set(Utc::now()),
                };
                account.insert(&self.db).await?.id
            }
        };

        let code = generate_otp();
        let secret_hash = hash_otp(&code)?;

        // Only the most recent passcode is valid
        EmailTokens::delete_many()
            .filter(email_tokens::Column::AccountId.eq(account_id.as_str()))
            .exec(&self.db)
            .await?;

        let token = email_tokens::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            account_id: Set(account_id.clone()),
            secret_hash: Set(secret_hash),
            expires_at: Set(Utc::now() + self.otp_ttl),
            attempts: Set(0),
        };
        token.insert(&self.db).await?;

        self.mailer
            .send_otp(email, &code)
            .await
            .map_err(|e| BackendError::Delivery(format!("{:#}", e)))?;

        Ok(EmailToken {
            user_id: account_id,
        })
    }

    async fn create_session(&self, user_id: &str, secret: &str) -> BackendResult<Session> {
        let now = Utc::now();
        let tokens = EmailTokens::find()
            .filter(email_tokens::Column::AccountId.eq(user_id))
            .filter(email_tokens::Column::ExpiresAt.gt(now))
            .all(&self.db)
            .await?;

        if !tokens.iter().any(|t| verify_otp(secret, &t.secret_hash)) {
            for token in tokens {
                let attempts = token.attempts + 1;
                if attempts >= MAX_OTP_ATTEMPTS {
                    tracing::warn!("🚫 Passcode for account {} locked after {} attempts", user_id, attempts);
                    EmailTokens::delete_by_id(token.id).exec(&self.db).await?;
                } else {
                    let mut active: email_tokens::ActiveModel = token.into();
                    active.attempts = Set(attempts);
                    active.update(&self.db).await?;
                }
            }
            return Err(BackendError::InvalidCredentials(
                "Invalid or expired passcode".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        EmailTokens::delete_many()
            .filter(email_tokens::Column::AccountId.eq(user_id))
            .exec(&txn)
            .await?;

        let session_secret = generate_secret();
        let expires_at = now + self.session_ttl;
        let session = sessions::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            account_id: Set(user_id.to_string()),
            secret_hash: Set(calculate_hash(session_secret.as_bytes())),
            expires_at: Set(expires_at),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!("🔑 Session created for account {}", user_id);

        Ok(Session {
            id: session.id,
            secret: session_secret,
            expires_at,
        })
    }

    async fn get_account(&self, session_secret: &str) -> BackendResult<Principal> {
        let session = Sessions::find()
            .filter(sessions::Column::SecretHash.eq(calculate_hash(session_secret.as_bytes())))
            .filter(sessions::Column::ExpiresAt.gt(Utc::now()))
            .one(&self.db)
            .await?
            .ok_or(BackendError::InvalidSession)?;

        let account = Accounts::find_by_id(session.account_id)
            .one(&self.db)
            .await?
            .ok_or(BackendError::InvalidSession)?;

        Ok(Principal {
            id: account.id,
            email: account.email,
        })
    }

    async fn delete_session(&self, session_secret: &str) -> BackendResult<()> {
        let result = Sessions::delete_many()
            .filter(sessions::Column::SecretHash.eq(calculate_hash(session_secret.as_bytes())))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(BackendError::InvalidSession);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqlBackend {
    async fn create_user(&self, user: NewUser) -> BackendResult<User> {
        let now = Utc::now();
        let model = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            full_name: Set(user.full_name),
            email: Set(user.email),
            avatar_url: Set(user.avatar_url),
            account_id: Set(user.account_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model.into())
    }

    async fn find_user_by_email(&self, email: &str) -> BackendResult<Option<User>> {
        Ok(Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .map(User::from))
    }

    async fn find_user_by_account(&self, account_id: &str) -> BackendResult<Option<User>> {
        Ok(Users::find()
            .filter(users::Column::AccountId.eq(account_id))
            .one(&self.db)
            .await?
            .map(User::from))
    }

    async fn create_file(&self, file: NewFile) -> BackendResult<File> {
        let now = Utc::now();
        let model = files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            search_name: Set(file.name.to_lowercase()),
            name: Set(file.name),
            extension: Set(file.extension),
            file_type: Set(file.file_type.as_str().to_string()),
            url: Set(file.url),
            size: Set(file.size),
            owner_id: Set(file.owner_id),
            account_id: Set(file.account_id),
            bucket_file_id: Set(file.bucket_file_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model.into_file(Vec::new()))
    }

    async fn get_file(&self, id: &str) -> BackendResult<File> {
        let model = Files::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("file {}", id)))?;
        Self::with_shares(&self.db, model).await
    }

    async fn find_file_by_blob(&self, bucket_file_id: &str) -> BackendResult<Option<File>> {
        let model = Files::find()
            .filter(files::Column::BucketFileId.eq(bucket_file_id))
            .one(&self.db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::with_shares(&self.db, model).await?)),
            None => Ok(None),
        }
    }

    async fn list_files(&self, query: &FileQuery) -> BackendResult<FileList> {
        let condition = file_condition(query);

        let total = Files::find()
            .filter(condition.clone())
            .count(&self.db)
            .await?;

        let order = match query.sort.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let models = Files::find()
            .filter(condition)
            .order_by(sort_column(query.sort.field), order.clone())
            .order_by(files::Column::Id, order)
            .limit(query.limit)
            .all(&self.db)
            .await?;

        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let mut shares = Self::shares_for(&self.db, &ids).await?;
        let documents = models
            .into_iter()
            .map(|m| {
                let emails = shares.remove(&m.id).unwrap_or_default();
                m.into_file(emails)
            })
            .collect();

        Ok(FileList { total, documents })
    }

    async fn update_file(&self, id: &str, patch: FilePatch) -> BackendResult<File> {
        let txn = self.db.begin().await?;

        let model = Files::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("file {}", id)))?;

        let mut active: files::ActiveModel = model.into();
        if let Some(name) = patch.name {
            active.search_name = Set(name.to_lowercase());
            active.name = Set(name);
        }
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;

        if let Some(emails) = patch.shared_user_emails {
            FileShares::delete_many()
                .filter(file_shares::Column::FileId.eq(id))
                .exec(&txn)
                .await?;

            if !emails.is_empty() {
                let rows = emails.into_iter().enumerate().map(|(position, email)| {
                    file_shares::ActiveModel {
                        file_id: Set(id.to_string()),
                        email: Set(email),
                        position: Set(position as i32),
                    }
                });
                FileShares::insert_many(rows).exec(&txn).await?;
            }
        }

        let file = Self::with_shares(&txn, model).await?;
        txn.commit().await?;
        Ok(file)
    }

    async fn delete_file(&self, id: &str) -> BackendResult<()> {
        let txn = self.db.begin().await?;
        FileShares::delete_many()
            .filter(file_shares::Column::FileId.eq(id))
            .exec(&txn)
            .await?;
        let result = Files::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(BackendError::NotFound(format!("file {}", id)));
        }
        txn.commit().await?;
        Ok(())
    }
}
