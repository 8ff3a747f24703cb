use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rust_file_drive::api::error::AppError;
use rust_file_drive::backend::{Backend, BackendError};
use rust_file_drive::backend::memory::MemoryBackend;
use rust_file_drive::models::{File, FileType, User};
use rust_file_drive::services::file_service::{FileService, UploadFile};
use rust_file_drive::services::revalidation::Revalidator;
use rust_file_drive::views::search::{
    FileLookup, Navigator, SEARCH_DEBOUNCE, SearchController, SearchPhase, UserFileLookup,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingLookup {
    queries: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingLookup {
    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileLookup for RecordingLookup {
    async fn search(&self, text: &str) -> Result<Vec<File>, AppError> {
        self.queries.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(BackendError::Unavailable("search offline".to_string()).into());
        }
        Ok(vec![file_named(&format!("{}.mp4", text), FileType::Video)])
    }
}

#[derive(Default)]
struct RecordingNavigator {
    pushed: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, location: &str) {
        self.pushed.lock().unwrap().push(location.to_string());
    }
}

fn file_named(name: &str, file_type: FileType) -> File {
    let now = Utc::now();
    File {
        id: format!("id-{}", name),
        name: name.to_string(),
        extension: String::new(),
        file_type,
        url: String::new(),
        size: 1,
        owner_id: "u1".to_string(),
        account_id: "acc-u1".to_string(),
        shared_user_emails: Vec::new(),
        bucket_file_id: format!("blob-{}", name),
        created_at: now,
        updated_at: now,
    }
}

async fn quiet_period() {
    tokio::time::sleep(SEARCH_DEBOUNCE + Duration::from_millis(50)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn test_rapid_typing_issues_one_lookup() {
    let lookup = Arc::new(RecordingLookup::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(lookup.clone(), navigator.clone(), "/");

    search.on_input("a").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    search.on_input("ab").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    search.on_input("abc").await;
    assert!(lookup.queries().is_empty());

    quiet_period().await;

    assert_eq!(lookup.queries(), vec!["abc"]);
    let state = search.snapshot().await;
    assert_eq!(state.query, "abc");
    assert!(state.open);
    assert_eq!(state.phase, SearchPhase::ResultsShown);
    assert_eq!(state.results.len(), 1);
    assert!(navigator.pushed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clearing_input_strips_query_without_lookup() {
    let lookup = Arc::new(RecordingLookup::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(
        lookup.clone(),
        navigator.clone(),
        "/documents?query=old&sort=size-asc",
    );
    assert_eq!(search.snapshot().await.query, "old");

    search.on_input("o").await;
    search.on_input("").await;
    quiet_period().await;

    assert!(lookup.queries().is_empty());
    assert_eq!(navigator.pushed(), vec!["/documents?sort=size-asc"]);
    let state = search.snapshot().await;
    assert!(!state.open);
    assert!(state.results.is_empty());
    assert_eq!(state.phase, SearchPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_whitespace_counts_as_empty() {
    let lookup = Arc::new(RecordingLookup::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(lookup.clone(), navigator.clone(), "/images?query=cat");

    search.on_input("   ").await;
    quiet_period().await;

    assert!(lookup.queries().is_empty());
    assert_eq!(navigator.pushed(), vec!["/images"]);
}

#[tokio::test(start_paused = true)]
async fn test_selecting_result_navigates_to_listing() {
    let lookup = Arc::new(RecordingLookup::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(lookup.clone(), navigator.clone(), "/");

    search.on_input("abc").await;
    quiet_period().await;
    let result = search.snapshot().await.results[0].clone();

    search.select(&result).await;

    assert_eq!(navigator.pushed(), vec!["/media?query=abc"]);
    let state = search.snapshot().await;
    assert!(!state.open);
    assert!(state.results.is_empty());
    assert_eq!(state.location, "/media?query=abc");
    assert_eq!(state.query, "abc");
}

#[tokio::test(start_paused = true)]
async fn test_failed_lookup_shows_nothing() {
    let lookup = Arc::new(RecordingLookup {
        fail: true,
        ..Default::default()
    });
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(lookup.clone(), navigator.clone(), "/");

    search.on_input("report").await;
    quiet_period().await;

    assert_eq!(lookup.queries(), vec!["report"]);
    let state = search.snapshot().await;
    assert!(!state.open);
    assert!(state.results.is_empty());
    assert_eq!(state.phase, SearchPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_separate_pauses_issue_separate_lookups() {
    let lookup = Arc::new(RecordingLookup::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(lookup.clone(), navigator.clone(), "/");

    search.on_input("cat").await;
    quiet_period().await;
    search.on_input("cats").await;
    quiet_period().await;

    assert_eq!(lookup.queries(), vec!["cat", "cats"]);
}

#[tokio::test(start_paused = true)]
async fn test_user_lookup_searches_visible_files_by_name() {
    let store = Arc::new(MemoryBackend::new());
    let files = FileService::new(
        Backend::in_memory(store.clone()),
        Arc::new(Revalidator::new()),
        "http://drive.test".to_string(),
        1024,
    );
    for (name, owner) in [("Report.pdf", "u1"), ("cat.png", "u1"), ("report-bob.pdf", "u2")] {
        files
            .upload_file(UploadFile {
                filename: name.to_string(),
                bytes: Bytes::from_static(b"data"),
                owner_id: owner.to_string(),
                account_id: format!("acc-{}", owner),
                path: "/".to_string(),
            })
            .await
            .unwrap();
    }

    let now = Utc::now();
    let user = User {
        id: "u1".to_string(),
        full_name: "Ada".to_string(),
        email: "ada@x.com".to_string(),
        avatar_url: String::new(),
        account_id: "acc-u1".to_string(),
        created_at: now,
        updated_at: now,
    };
    let navigator = Arc::new(RecordingNavigator::default());
    let search = SearchController::new(
        Arc::new(UserFileLookup::new(files, user)),
        navigator,
        "/",
    );

    search.on_input("report").await;
    quiet_period().await;

    let results = search.snapshot().await.results;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Report.pdf");
}
