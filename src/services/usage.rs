use crate::api::error::AppError;
use crate::backend::Backend;
use crate::models::{File, FileType, User};
use crate::services::query::FileQuery;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Storage available to every user (2 GiB).
pub const TOTAL_CAPACITY: i64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeUsage {
    pub size: i64,
    /// Most recent `updated_at` among files of this type; absent for an empty bucket.
    pub latest_date: Option<DateTime<Utc>>,
}

impl TypeUsage {
    fn add(&mut self, file: &File) {
        self.size += file.size;
        if self.latest_date.is_none_or(|d| file.updated_at > d) {
            self.latest_date = Some(file.updated_at);
        }
    }

    fn merge(self, other: TypeUsage) -> TypeUsage {
        TypeUsage {
            size: self.size + other.size,
            latest_date: self.latest_date.max(other.latest_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub image: TypeUsage,
    pub video: TypeUsage,
    pub audio: TypeUsage,
    pub document: TypeUsage,
    pub other: TypeUsage,
    pub used: i64,
    pub all: i64,
}

/// One dashboard card: a group of file types and where its listing lives.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageCard {
    pub title: String,
    pub size: i64,
    pub latest_date: Option<DateTime<Utc>>,
    pub url: String,
}

impl Default for UsageTotals {
    fn default() -> Self {
        Self {
            image: TypeUsage::default(),
            video: TypeUsage::default(),
            audio: TypeUsage::default(),
            document: TypeUsage::default(),
            other: TypeUsage::default(),
            used: 0,
            all: TOTAL_CAPACITY,
        }
    }
}

impl UsageTotals {
    /// Folds `files` into per-type totals in a single pass.
    pub fn from_files<'a>(files: impl IntoIterator<Item = &'a File>) -> Self {
        let mut totals = Self::default();
        for file in files {
            totals.bucket_mut(file.file_type).add(file);
            totals.used += file.size;
        }
        totals
    }

    pub fn bucket(&self, file_type: FileType) -> TypeUsage {
        match file_type {
            FileType::Image => self.image,
            FileType::Video => self.video,
            FileType::Audio => self.audio,
            FileType::Document => self.document,
            FileType::Other => self.other,
        }
    }

    fn bucket_mut(&mut self, file_type: FileType) -> &mut TypeUsage {
        match file_type {
            FileType::Image => &mut self.image,
            FileType::Video => &mut self.video,
            FileType::Audio => &mut self.audio,
            FileType::Document => &mut self.document,
            FileType::Other => &mut self.other,
        }
    }

    pub fn summary(&self) -> Vec<UsageCard> {
        let card = |title: &str, usage: TypeUsage, url: &str| UsageCard {
            title: title.to_string(),
            size: usage.size,
            latest_date: usage.latest_date,
            url: url.to_string(),
        };

        vec![
            card("Documents", self.document, "/documents"),
            card("Images", self.image, "/images"),
            card("Media", self.video.merge(self.audio), "/media"),
            card("Others", self.other, "/others"),
        ]
    }

    /// Share of the capacity in use, in percent with two decimals.
    pub fn percentage_used(&self) -> f64 {
        if self.all <= 0 {
            return 0.0;
        }
        let percentage = self.used as f64 / self.all as f64 * 100.0;
        (percentage * 100.0).round() / 100.0
    }
}

#[derive(Clone)]
pub struct UsageService {
    backend: Backend,
}

impl UsageService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Totals over the files `current_user` owns. Files shared with them do not count.
    pub async fn compute_usage(&self, current_user: &User) -> Result<UsageTotals, AppError> {
        let files = self
            .backend
            .documents
            .list_files(&FileQuery::owned_by(&current_user.id))
            .await
            .map_err(|e| AppError::from(e).logged("Failed to calculate total space used"))?;

        Ok(UsageTotals::from_files(&files.documents))
    }
}
