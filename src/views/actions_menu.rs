use crate::models::File;
use crate::services::file_service::{DeleteFile, FileActions, RenameFile, UpdateFileUsers};
use crate::utils::file_type::{construct_download_url, convert_file_size};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Rename,
    Details,
    Share,
    Download,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionItem {
    pub label: &'static str,
    pub icon: &'static str,
    pub value: ActionKind,
}

pub const ACTION_ITEMS: [ActionItem; 5] = [
    ActionItem {
        label: "Rename",
        icon: "/assets/icons/edit.svg",
        value: ActionKind::Rename,
    },
    ActionItem {
        label: "Details",
        icon: "/assets/icons/info.svg",
        value: ActionKind::Details,
    },
    ActionItem {
        label: "Share",
        icon: "/assets/icons/share.svg",
        value: ActionKind::Share,
    },
    ActionItem {
        label: "Download",
        icon: "/assets/icons/download.svg",
        value: ActionKind::Download,
    },
    ActionItem {
        label: "Delete",
        icon: "/assets/icons/delete.svg",
        value: ActionKind::Delete,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    MenuOpen,
    ModalOpen(ActionKind),
}

/// What the details modal shows.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDetails {
    pub format: String,
    pub size: String,
    pub owner: String,
    pub last_edit: String,
}

/// "10:15am, 6 Jan"
pub fn format_date_time(date: DateTime<Utc>) -> String {
    date.format("%-I:%M%P, %-d %b").to_string()
}

fn stem(file: &File) -> String {
    let suffix = format!(".{}", file.extension);
    match file.name.strip_suffix(&suffix) {
        Some(stem) if !file.extension.is_empty() && !stem.is_empty() => stem.to_string(),
        _ => file.name.clone(),
    }
}

/// Per-file action menu. Confirming a modal dispatches to the matching file action;
/// everything closes only when the action succeeds.
pub struct ActionsMenu {
    file: File,
    path: String,
    public_base_url: String,
    actions: Arc<dyn FileActions>,
    state: MenuState,
    name: String,
    emails: Vec<String>,
    loading: bool,
    deleted: bool,
}

impl ActionsMenu {
    pub fn new(
        file: File,
        path: &str,
        public_base_url: &str,
        actions: Arc<dyn FileActions>,
    ) -> Self {
        let name = stem(&file);
        Self {
            file,
            path: path.to_string(),
            public_base_url: public_base_url.to_string(),
            actions,
            state: MenuState::Closed,
            name,
            emails: Vec::new(),
            loading: false,
            deleted: false,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn open_menu(&mut self) {
        if self.state == MenuState::Closed {
            self.state = MenuState::MenuOpen;
        }
    }

    /// Picks a menu item. Download closes the menu and returns the link to follow;
    /// every other item opens its modal.
    pub fn select(&mut self, action: ActionKind) -> Option<String> {
        match action {
            ActionKind::Download => {
                self.state = MenuState::Closed;
                Some(construct_download_url(
                    &self.public_base_url,
                    &self.file.bucket_file_id,
                ))
            }
            _ => {
                self.state = MenuState::ModalOpen(action);
                None
            }
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Share input: the full list of recipients to submit.
    pub fn set_emails(&mut self, emails: Vec<String>) {
        self.emails = emails;
    }

    pub fn details(&self, owner_name: &str) -> FileDetails {
        FileDetails {
            format: self.file.extension.clone(),
            size: convert_file_size(self.file.size),
            owner: owner_name.to_string(),
            last_edit: format_date_time(self.file.updated_at),
        }
    }

    /// Submits the open modal. Returns whether the action succeeded.
    pub async fn confirm(&mut self) -> bool {
        let action = match self.state {
            MenuState::ModalOpen(
                action @ (ActionKind::Rename | ActionKind::Share | ActionKind::Delete),
            ) => action,
            _ => return false,
        };

        self.loading = true;
        let succeeded = match action {
            ActionKind::Rename => self
                .actions
                .rename_file(RenameFile {
                    file_id: self.file.id.clone(),
                    name: self.name.clone(),
                    extension: self.file.extension.clone(),
                    path: self.path.clone(),
                })
                .await
                .map(|file| self.file = file),
            ActionKind::Share => self
                .actions
                .update_file_users(UpdateFileUsers {
                    file_id: self.file.id.clone(),
                    emails: self.emails.clone(),
                    path: self.path.clone(),
                })
                .await
                .map(|file| self.file = file),
            _ => self
                .actions
                .delete_file(DeleteFile {
                    file_id: self.file.id.clone(),
                    bucket_file_id: self.file.bucket_file_id.clone(),
                    path: self.path.clone(),
                })
                .await
                .map(|_| self.deleted = true),
        };

        let succeeded = match succeeded {
            Ok(()) => {
                self.close_all();
                true
            }
            Err(e) => {
                tracing::error!("Action {:?} on {} failed: {}", action, self.file.id, e);
                false
            }
        };
        self.loading = false;
        succeeded
    }

    /// Unshares the file with `email` and closes every modal, whatever the outcome.
    pub async fn remove_user(&mut self, email: &str) -> bool {
        let remaining: Vec<String> = self
            .file
            .shared_user_emails
            .iter()
            .filter(|e| e.as_str() != email)
            .cloned()
            .collect();

        let result = self
            .actions
            .update_file_users(UpdateFileUsers {
                file_id: self.file.id.clone(),
                emails: remaining.clone(),
                path: self.path.clone(),
            })
            .await;

        let succeeded = match result {
            Ok(file) => {
                self.file = file;
                self.emails = remaining;
                true
            }
            Err(e) => {
                tracing::error!("Removing {} from {} failed: {}", email, self.file.id, e);
                false
            }
        };
        self.close_all();
        succeeded
    }

    pub fn cancel(&mut self) {
        self.close_all();
    }

    fn close_all(&mut self) {
        self.state = MenuState::Closed;
        self.name = stem(&self.file);
    }
}
