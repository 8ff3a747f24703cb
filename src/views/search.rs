use crate::api::error::AppError;
use crate::models::{File, User};
use crate::services::file_service::{FileService, GetFiles};
use crate::views::routes::{listing_route, query_param, strip_query_param, with_query};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Text search over the caller's files.
#[async_trait]
pub trait FileLookup: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<File>, AppError>;
}

/// Receives the locations the search view navigates to.
pub trait Navigator: Send + Sync {
    fn push(&self, location: &str);
}

/// [`FileLookup`] for one user, backed by the file service.
pub struct UserFileLookup {
    files: FileService,
    user: User,
}

impl UserFileLookup {
    pub fn new(files: FileService, user: User) -> Self {
        Self { files, user }
    }
}

#[async_trait]
impl FileLookup for UserFileLookup {
    async fn search(&self, text: &str) -> Result<Vec<File>, AppError> {
        let list = self
            .files
            .get_files(
                &self.user,
                GetFiles {
                    search_text: text.to_string(),
                    ..Default::default()
                },
            )
            .await?;
        Ok(list.documents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    DebouncePending,
    ResultsShown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<File>,
    pub open: bool,
    pub phase: SearchPhase,
    /// Current location, path plus query string.
    pub location: String,
}

/// Debounced search box. Keystrokes update the query at once; the lookup runs
/// only after the input has been quiet for the debounce interval.
pub struct SearchController {
    state: Arc<Mutex<SearchState>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    lookup: Arc<dyn FileLookup>,
    navigator: Arc<dyn Navigator>,
    debounce: Duration,
}

impl SearchController {
    pub fn new(
        lookup: Arc<dyn FileLookup>,
        navigator: Arc<dyn Navigator>,
        location: &str,
    ) -> Self {
        Self::with_debounce(lookup, navigator, location, SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(
        lookup: Arc<dyn FileLookup>,
        navigator: Arc<dyn Navigator>,
        location: &str,
        debounce: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SearchState {
                query: query_param(location).unwrap_or_default(),
                results: Vec::new(),
                open: false,
                phase: SearchPhase::Idle,
                location: location.to_string(),
            })),
            pending: Mutex::new(None),
            lookup,
            navigator,
            debounce,
        }
    }

    pub async fn snapshot(&self) -> SearchState {
        self.state.lock().await.clone()
    }

    /// Records a keystroke and restarts the debounce timer.
    pub async fn on_input(&self, text: &str) {
        {
            let mut state = self.state.lock().await;
            state.query = text.to_string();
            state.phase = SearchPhase::DebouncePending;
        }

        let mut pending = self.pending.lock().await;
        if let Some(timer) = pending.take() {
            timer.abort();
        }

        let text = text.to_string();
        let state = self.state.clone();
        let lookup = self.lookup.clone();
        let navigator = self.navigator.clone();
        let debounce = self.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            // Detached so a later keystroke only cancels the timer, never an issued lookup
            tokio::spawn(commit(state, lookup, navigator, text));
        }));
    }

    /// Opens the listing page of `file`, carrying the current query.
    pub async fn select(&self, file: &File) {
        let location = {
            let mut state = self.state.lock().await;
            state.open = false;
            state.results.clear();
            state.phase = SearchPhase::Idle;
            state.location = with_query(listing_route(file.file_type), &state.query);
            state.location.clone()
        };
        self.navigator.push(&location);
    }

    /// The location changed outside the search box. Clears the input when the
    /// new location carries no query.
    pub async fn on_location_change(&self, location: &str) {
        let mut state = self.state.lock().await;
        state.location = location.to_string();
        if query_param(location).is_none_or(|q| q.is_empty()) {
            state.query.clear();
        }
    }
}

async fn commit(
    state: Arc<Mutex<SearchState>>,
    lookup: Arc<dyn FileLookup>,
    navigator: Arc<dyn Navigator>,
    text: String,
) {
    if text.trim().is_empty() {
        let location = {
            let mut state = state.lock().await;
            state.results.clear();
            state.open = false;
            state.phase = SearchPhase::Idle;
            state.location = strip_query_param(&state.location);
            state.location.clone()
        };
        navigator.push(&location);
        return;
    }

    match lookup.search(&text).await {
        Ok(files) => {
            let mut state = state.lock().await;
            state.results = files;
            state.open = true;
            state.phase = SearchPhase::ResultsShown;
        }
        Err(e) => {
            tracing::warn!("Search for '{}' failed: {}", text, e);
            let mut state = state.lock().await;
            if state.phase == SearchPhase::DebouncePending {
                state.phase = if state.open {
                    SearchPhase::ResultsShown
                } else {
                    SearchPhase::Idle
                };
            }
        }
    }
}
