use crate::api::error::AppError;
use crate::backend::{Backend, NewUser, Session};
use crate::models::{AccountRef, SignInOutcome, User};
use uuid::Uuid;

/// Resolves the caller from a session secret and runs the passcode login flow.
#[derive(Clone)]
pub struct UserService {
    backend: Backend,
    avatar_placeholder_url: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserService {
    pub fn new(backend: Backend, avatar_placeholder_url: String) -> Self {
        Self {
            backend,
            avatar_placeholder_url,
        }
    }

    /// Returns the user behind `session_secret`, or `None` when there is no secret,
    /// the identity lookup fails or no user record belongs to the account.
    pub async fn get_current_user(&self, session_secret: Option<&str>) -> Option<User> {
        let secret = session_secret.filter(|s| !s.is_empty())?;

        let principal = match self.backend.identity.get_account(secret).await {
            Ok(principal) => principal,
            Err(e) => {
                tracing::warn!("Could not resolve session: {}", e);
                return None;
            }
        };

        match self.backend.documents.find_user_by_account(&principal.id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Could not load user for account {}: {}", principal.id, e);
                None
            }
        }
    }

    /// Issues a passcode for `email` and returns the account id it belongs to.
    pub async fn send_email_otp(&self, email: &str) -> Result<String, AppError> {
        let email = normalize_email(email);
        let token = self
            .backend
            .identity
            .create_email_token(&Uuid::new_v4().to_string(), &email)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to send email OTP"))?;
        Ok(token.user_id)
    }

    /// Sends a passcode and creates the user record on first sign-up.
    pub async fn create_account(
        &self,
        full_name: &str,
        email: &str,
    ) -> Result<AccountRef, AppError> {
        let email = normalize_email(email);
        let existing = self
            .backend
            .documents
            .find_user_by_email(&email)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to create account"))?;

        let account_id = self.send_email_otp(&email).await?;

        if existing.is_none() {
            self.backend
                .documents
                .create_user(NewUser {
                    full_name: full_name.trim().to_string(),
                    email: email.clone(),
                    avatar_url: self.avatar_placeholder_url.clone(),
                    account_id: account_id.clone(),
                })
                .await
                .map_err(|e| AppError::from(e).logged("Failed to create account"))?;
            tracing::info!("👤 Created user for {}", email);
        }

        Ok(AccountRef { account_id })
    }

    /// Sends a passcode to a known user. An unknown address is reported in the
    /// outcome rather than as an error.
    pub async fn sign_in_user(&self, email: &str) -> Result<SignInOutcome, AppError> {
        let email = normalize_email(email);
        let existing = self
            .backend
            .documents
            .find_user_by_email(&email)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to sign in user"))?;

        match existing {
            Some(_) => {
                let account_id = self.send_email_otp(&email).await?;
                Ok(SignInOutcome {
                    account_id: Some(account_id),
                    error: None,
                })
            }
            None => Ok(SignInOutcome {
                account_id: None,
                error: Some("User not found".to_string()),
            }),
        }
    }

    /// Exchanges the passcode for a session. The caller stores `secret` in the session cookie.
    pub async fn verify_secret(&self, account_id: &str, password: &str) -> Result<Session, AppError> {
        self.backend
            .identity
            .create_session(account_id, password.trim())
            .await
            .map_err(|e| AppError::from(e).logged("Failed to verify OTP"))
    }

    pub async fn logout_user(&self, session_secret: &str) -> Result<(), AppError> {
        self.backend
            .identity
            .delete_session(session_secret)
            .await
            .map_err(|e| AppError::from(e).logged("Failed to sign out user"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{BackendCall, MemoryBackend};
    use std::sync::Arc;

    fn service() -> (Arc<MemoryBackend>, UserService) {
        let store = Arc::new(MemoryBackend::new());
        let users = UserService::new(Backend::in_memory(store.clone()), "avatar.png".into());
        (store, users)
    }

    #[tokio::test]
    async fn test_sign_up_verify_and_resolve() {
        let (store, users) = service();
        let account = users.create_account("Ada", " Ada@X.com ").await.unwrap();

        let code = store.last_otp("ada@x.com").unwrap();
        let session = users.verify_secret(&account.account_id, &code).await.unwrap();

        let user = users.get_current_user(Some(&session.secret)).await.unwrap();
        assert_eq!(user.email, "ada@x.com");
        assert_eq!(user.avatar_url, "avatar.png");
        assert_eq!(user.account_id, account.account_id);
    }

    #[tokio::test]
    async fn test_second_sign_up_does_not_duplicate_user() {
        let (store, users) = service();
        let first = users.create_account("Ada", "ada@x.com").await.unwrap();
        let second = users.create_account("Ada", "ada@x.com").await.unwrap();
        assert_eq!(first, second);

        let created = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::CreateUser { .. }))
            .count();
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_sign_in_unknown_user_is_not_an_error() {
        let (store, users) = service();
        let outcome = users.sign_in_user("nobody@x.com").await.unwrap();
        assert_eq!(outcome.account_id, None);
        assert_eq!(outcome.error.as_deref(), Some("User not found"));
        assert!(store.last_otp("nobody@x.com").is_none());
    }

    #[tokio::test]
    async fn test_current_user_is_none_on_failure() {
        let (store, users) = service();
        assert!(users.get_current_user(None).await.is_none());
        assert!(users.get_current_user(Some("bogus")).await.is_none());

        store.fail(|f| f.get_account = true);
        assert!(users.get_current_user(Some("anything")).await.is_none());
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (store, users) = service();
        let account = users.create_account("Ada", "ada@x.com").await.unwrap();
        let code = store.last_otp("ada@x.com").unwrap();
        let session = users.verify_secret(&account.account_id, &code).await.unwrap();

        users.logout_user(&session.secret).await.unwrap();
        assert!(users.get_current_user(Some(&session.secret)).await.is_none());
        assert!(users.logout_user(&session.secret).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_passcode_is_rejected() {
        let (_store, users) = service();
        let account = users.create_account("Ada", "ada@x.com").await.unwrap();
        let err = users
            .verify_secret(&account.account_id, "nope")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Backend(crate::backend::BackendError::InvalidCredentials(_))
        ));
    }
}
