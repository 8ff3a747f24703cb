use async_trait::async_trait;
use chrono::Duration;
use rust_file_drive::backend::sql::SqlBackend;
use rust_file_drive::backend::{
    BackendError, DocumentStore, FilePatch, IdentityService, MAX_OTP_ATTEMPTS, NewFile, NewUser,
};
use rust_file_drive::infrastructure::database;
use rust_file_drive::models::{FileType, User};
use rust_file_drive::services::mailer::OtpMailer;
use rust_file_drive::services::query::{FileQuery, build_query};
use sea_orm::{ConnectOptions, Database};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CapturingMailer {
    codes: Mutex<HashMap<String, String>>,
    fail: bool,
}

impl CapturingMailer {
    fn code_for(&self, email: &str) -> String {
        self.codes.lock().unwrap().get(email).cloned().unwrap()
    }
}

#[async_trait]
impl OtpMailer for CapturingMailer {
    async fn send_otp(&self, email: &str, code: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("smtp relay refused connection");
        }
        self.codes
            .lock()
            .unwrap()
            .insert(email.to_string(), code.to_string());
        Ok(())
    }
}

async fn backend_with(mailer: Arc<CapturingMailer>) -> SqlBackend {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    // A single connection keeps every query on the same in-memory database
    opt.max_connections(1).min_connections(1);
    let db = Database::connect(opt).await.unwrap();
    database::run_migrations(&db).await.unwrap();
    SqlBackend::new(db, mailer, Duration::minutes(15), Duration::days(30))
}

async fn new_user(backend: &SqlBackend, name: &str, email: &str) -> User {
    backend
        .create_user(NewUser {
            full_name: name.to_string(),
            email: email.to_string(),
            avatar_url: String::new(),
            account_id: format!("acc-{}", email),
        })
        .await
        .unwrap()
}

async fn new_file(backend: &SqlBackend, owner: &User, name: &str, file_type: FileType, size: i64) -> String {
    let blob = format!("blob-{}-{}", owner.id, name);
    backend
        .create_file(NewFile {
            name: name.to_string(),
            extension: name.rsplit_once('.').map(|(_, e)| e.to_string()).unwrap_or_default(),
            file_type,
            url: format!("http://drive.test/storage/{}/view", blob),
            size,
            owner_id: owner.id.clone(),
            account_id: owner.account_id.clone(),
            bucket_file_id: blob,
        })
        .await
        .unwrap()
        .id
}

async fn share(backend: &SqlBackend, file_id: &str, emails: &[&str]) {
    backend
        .update_file(
            file_id,
            FilePatch {
                shared_user_emails: Some(emails.iter().map(|e| e.to_string()).collect()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_identity_cycle() {
    let mailer = Arc::new(CapturingMailer::default());
    let backend = backend_with(mailer.clone()).await;

    let token = backend.create_email_token("acc-1", "ada@x.com").await.unwrap();
    assert_eq!(token.user_id, "acc-1");
    let first_code = mailer.code_for("ada@x.com");

    // A second request keeps the account and supersedes the first passcode
    let token = backend.create_email_token("acc-2", "ada@x.com").await.unwrap();
    assert_eq!(token.user_id, "acc-1");
    let code = mailer.code_for("ada@x.com");
    if code != first_code {
        assert!(matches!(
            backend.create_session("acc-1", &first_code).await,
            Err(BackendError::InvalidCredentials(_))
        ));
    }

    assert!(matches!(
        backend.create_session("acc-1", "not-a-code").await,
        Err(BackendError::InvalidCredentials(_))
    ));

    let session = backend.create_session("acc-1", &code).await.unwrap();
    assert!(!session.secret.is_empty());

    // Passcodes are single use
    assert!(backend.create_session("acc-1", &code).await.is_err());

    let principal = backend.get_account(&session.secret).await.unwrap();
    assert_eq!(principal.id, "acc-1");
    assert_eq!(principal.email, "ada@x.com");

    backend.delete_session(&session.secret).await.unwrap();
    assert!(matches!(
        backend.get_account(&session.secret).await,
        Err(BackendError::InvalidSession)
    ));
    assert!(matches!(
        backend.delete_session(&session.secret).await,
        Err(BackendError::InvalidSession)
    ));
}

#[tokio::test]
async fn test_passcode_locked_after_repeated_wrong_guesses() {
    let mailer = Arc::new(CapturingMailer::default());
    let backend = backend_with(mailer.clone()).await;

    backend.create_email_token("acc-1", "ada@x.com").await.unwrap();
    let code = mailer.code_for("ada@x.com");

    for _ in 0..MAX_OTP_ATTEMPTS {
        assert!(matches!(
            backend.create_session("acc-1", "000000x").await,
            Err(BackendError::InvalidCredentials(_))
        ));
    }
    assert!(matches!(
        backend.create_session("acc-1", &code).await,
        Err(BackendError::InvalidCredentials(_))
    ));

    // Requesting a new passcode restores access
    backend.create_email_token("acc-1", "ada@x.com").await.unwrap();
    let code = mailer.code_for("ada@x.com");
    for _ in 1..MAX_OTP_ATTEMPTS {
        assert!(backend.create_session("acc-1", "000000x").await.is_err());
    }
    assert!(backend.create_session("acc-1", &code).await.is_ok());
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let mailer = Arc::new(CapturingMailer {
        fail: true,
        ..Default::default()
    });
    let backend = backend_with(mailer).await;

    let result = backend.create_email_token("acc-1", "ada@x.com").await;
    match result {
        Err(BackendError::Delivery(msg)) => assert!(msg.contains("smtp relay")),
        other => panic!("expected delivery error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_users_lookup() {
    let backend = backend_with(Arc::new(CapturingMailer::default())).await;
    let ada = new_user(&backend, "Ada", "ada@x.com").await;

    let by_email = backend.find_user_by_email("ada@x.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, ada.id);
    assert_eq!(by_email.full_name, "Ada");
    let by_account = backend
        .find_user_by_account(&ada.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_account.id, ada.id);
    assert_eq!(backend.find_user_by_email("bob@x.com").await.unwrap(), None);
}

#[tokio::test]
async fn test_listing_visibility_filters_and_total() {
    let backend = backend_with(Arc::new(CapturingMailer::default())).await;
    let ada = new_user(&backend, "Ada", "ada@x.com").await;
    let bob = new_user(&backend, "Bob", "bob@x.com").await;

    new_file(&backend, &ada, "Report 2024.pdf", FileType::Document, 30).await;
    new_file(&backend, &ada, "holiday.png", FileType::Image, 10).await;
    let clip = new_file(&backend, &bob, "clip.mp4", FileType::Video, 50).await;
    let private = new_file(&backend, &bob, "private_report.pdf", FileType::Document, 40).await;
    share(&backend, &clip, &["ada@x.com"]).await;
    share(&backend, &private, &["eve@x.com"]).await;

    let list = backend
        .list_files(&build_query(&ada, &[], "", "size-asc", None))
        .await
        .unwrap();
    assert_eq!(list.total, 3);
    let sizes: Vec<i64> = list.documents.iter().map(|f| f.size).collect();
    assert_eq!(sizes, vec![10, 30, 50]);
    let shared = list.documents.iter().find(|f| f.id == clip).unwrap();
    assert_eq!(shared.shared_user_emails, vec!["ada@x.com"]);

    let list = backend
        .list_files(&build_query(&ada, &[FileType::Image, FileType::Video], "", "size-desc", None))
        .await
        .unwrap();
    let names: Vec<&str> = list.documents.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["clip.mp4", "holiday.png"]);

    let list = backend
        .list_files(&build_query(&ada, &[], "REPORT", "", None))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.documents[0].name, "Report 2024.pdf");

    let list = backend
        .list_files(&build_query(&ada, &[], "", "size-desc", Some(1)))
        .await
        .unwrap();
    assert_eq!(list.total, 3);
    assert_eq!(list.documents.len(), 1);
    assert_eq!(list.documents[0].size, 50);

    let owned = backend.list_files(&FileQuery::owned_by(&ada.id)).await.unwrap();
    assert_eq!(owned.total, 2);
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let backend = backend_with(Arc::new(CapturingMailer::default())).await;
    let ada = new_user(&backend, "Ada", "ada@x.com").await;
    new_file(&backend, &ada, "100% done.txt", FileType::Document, 1).await;
    new_file(&backend, &ada, "1000 done.txt", FileType::Document, 2).await;
    new_file(&backend, &ada, "a_b.txt", FileType::Document, 3).await;
    new_file(&backend, &ada, "axb.txt", FileType::Document, 4).await;

    let list = backend
        .list_files(&build_query(&ada, &[], "0%", "", None))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.documents[0].name, "100% done.txt");

    let list = backend
        .list_files(&build_query(&ada, &[], "a_b", "", None))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.documents[0].name, "a_b.txt");
}

#[tokio::test]
async fn test_search_folds_non_ascii_case() {
    let backend = backend_with(Arc::new(CapturingMailer::default())).await;
    let ada = new_user(&backend, "Ada", "ada@x.com").await;
    new_file(&backend, &ada, "ÉTÉ Photos.png", FileType::Image, 1).await;
    let id = new_file(&backend, &ada, "draft.txt", FileType::Document, 2).await;

    let list = backend
        .list_files(&build_query(&ada, &[], "été", "", None))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.documents[0].name, "ÉTÉ Photos.png");

    backend
        .update_file(
            &id,
            FilePatch {
                name: Some("Straße.txt".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let list = backend
        .list_files(&build_query(&ada, &[], "STRASSE", "", None))
        .await
        .unwrap();
    assert_eq!(list.total, 0);
    let list = backend
        .list_files(&build_query(&ada, &[], "STRAßE", "", None))
        .await
        .unwrap();
    assert_eq!(list.total, 1);
}

#[tokio::test]
async fn test_update_replaces_shares_in_order() {
    let backend = backend_with(Arc::new(CapturingMailer::default())).await;
    let ada = new_user(&backend, "Ada", "ada@x.com").await;
    let id = new_file(&backend, &ada, "plan.pdf", FileType::Document, 5).await;

    share(&backend, &id, &["zed@x.com", "amy@x.com", "bob@x.com"]).await;
    assert_eq!(
        backend.get_file(&id).await.unwrap().shared_user_emails,
        vec!["zed@x.com", "amy@x.com", "bob@x.com"]
    );

    share(&backend, &id, &["bob@x.com"]).await;
    assert_eq!(
        backend.get_file(&id).await.unwrap().shared_user_emails,
        vec!["bob@x.com"]
    );

    let renamed = backend
        .update_file(
            &id,
            FilePatch {
                name: Some("final.pdf".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "final.pdf");
    assert_eq!(renamed.shared_user_emails, vec!["bob@x.com"]);

    share(&backend, &id, &[]).await;
    assert!(backend.get_file(&id).await.unwrap().shared_user_emails.is_empty());

    assert!(matches!(
        backend.update_file("missing", FilePatch::default()).await,
        Err(BackendError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_and_blob_lookup() {
    let backend = backend_with(Arc::new(CapturingMailer::default())).await;
    let ada = new_user(&backend, "Ada", "ada@x.com").await;
    let id = new_file(&backend, &ada, "cat.png", FileType::Image, 5).await;
    share(&backend, &id, &["bob@x.com"]).await;

    let blob = backend.get_file(&id).await.unwrap().bucket_file_id;
    let found = backend.find_file_by_blob(&blob).await.unwrap().unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.shared_user_emails, vec!["bob@x.com"]);

    backend.delete_file(&id).await.unwrap();
    assert!(matches!(
        backend.get_file(&id).await,
        Err(BackendError::NotFound(_))
    ));
    assert!(backend.find_file_by_blob(&blob).await.unwrap().is_none());
    assert!(matches!(
        backend.delete_file(&id).await,
        Err(BackendError::NotFound(_))
    ));
}
