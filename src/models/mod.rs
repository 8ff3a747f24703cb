use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Category a file is filed under, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::Image,
        FileType::Video,
        FileType::Audio,
        FileType::Document,
        FileType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Document => "document",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(FileType::Image),
            "video" => Ok(FileType::Video),
            "audio" => Ok(FileType::Audio),
            "document" => Ok(FileType::Document),
            "other" => Ok(FileType::Other),
            other => Err(format!("unknown file type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    pub name: String,
    pub extension: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub url: String,
    pub size: i64,
    pub owner_id: String,
    pub account_id: String,
    pub shared_user_emails: Vec<String>,
    /// Id of the blob holding the file contents.
    pub bucket_file_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl File {
    pub fn is_visible_to(&self, user: &User) -> bool {
        self.owner_id == user.id || self.shared_user_emails.iter().any(|e| e == &user.email)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileList {
    /// Number of matching files, ignoring any limit.
    pub total: u64,
    pub documents: Vec<File>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInOutcome {
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct DeleteStatus {
    pub status: String,
}

impl DeleteStatus {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}
