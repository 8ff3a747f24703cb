use crate::views::routes::types_for_route;
use dashmap::DashMap;

/// Per-path revision counters. A mutation bumps the revision of the path it was
/// issued from so views rendered for that path know to re-read it. Only the root
/// view and the type listings are tracked.
#[derive(Debug, Default)]
pub struct Revalidator {
    revisions: DashMap<String, u64>,
}

impl Revalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` stale and returns its new revision, zero for untracked paths.
    pub fn revalidate_path(&self, path: &str) -> u64 {
        let path = normalize(path);
        if !is_tracked(&path) {
            tracing::debug!("♻️ Ignoring revalidation of untracked path {}", path);
            return 0;
        }
        let mut revision = self.revisions.entry(path.clone()).or_insert(0);
        *revision += 1;
        tracing::debug!("♻️ Revalidated {} (revision {})", path, *revision);
        *revision
    }

    /// Current revision of `path`; zero when it was never revalidated.
    pub fn revision(&self, path: &str) -> u64 {
        self.revisions
            .get(&normalize(path))
            .map(|r| *r)
            .unwrap_or(0)
    }
}

fn is_tracked(path: &str) -> bool {
    path == "/" || !types_for_route(path).is_empty()
}

fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
