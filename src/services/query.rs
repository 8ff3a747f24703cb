use crate::models::{File, FileType, User};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Name,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    /// Parses a `"field-direction"` token such as `size-asc` or `$createdAt-desc`.
    /// Any direction other than `asc` sorts descending; unknown fields sort by creation time.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            return Self::default();
        }

        let (field, direction) = match token.rsplit_once('-') {
            Some((field, direction)) => (field, Some(direction)),
            None => (token, None),
        };

        let field = match field.trim_start_matches('$') {
            "createdAt" | "created_at" => SortField::CreatedAt,
            "updatedAt" | "updated_at" => SortField::UpdatedAt,
            "name" => SortField::Name,
            "size" => SortField::Size,
            _ => SortField::CreatedAt,
        };

        let direction = match direction {
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };

        Self { field, direction }
    }
}

/// Which files a query may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Files owned by the user or shared with their email.
    OwnedOrSharedWith { user_id: String, email: String },
    /// Only files owned by the user.
    OwnedBy(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileQuery {
    pub visibility: Visibility,
    pub types: Vec<FileType>,
    pub search_text: Option<String>,
    pub sort: SortSpec,
    pub limit: Option<u64>,
}

/// Translates listing criteria into a query. Pure: no backend access.
pub fn build_query(
    current_user: &User,
    types: &[FileType],
    search_text: &str,
    sort: &str,
    limit: Option<u64>,
) -> FileQuery {
    let search_text = if search_text.is_empty() {
        None
    } else {
        Some(search_text.to_string())
    };

    FileQuery {
        visibility: Visibility::OwnedOrSharedWith {
            user_id: current_user.id.clone(),
            email: current_user.email.clone(),
        },
        types: types.to_vec(),
        search_text,
        sort: SortSpec::parse(sort),
        limit: limit.filter(|l| *l > 0),
    }
}

impl FileQuery {
    pub fn owned_by(user_id: &str) -> Self {
        Self {
            visibility: Visibility::OwnedBy(user_id.to_string()),
            types: Vec::new(),
            search_text: None,
            sort: SortSpec::default(),
            limit: None,
        }
    }

    pub fn matches(&self, file: &File) -> bool {
        let visible = match &self.visibility {
            Visibility::OwnedOrSharedWith { user_id, email } => {
                &file.owner_id == user_id || file.shared_user_emails.iter().any(|e| e == email)
            }
            Visibility::OwnedBy(user_id) => &file.owner_id == user_id,
        };
        if !visible {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(&file.file_type) {
            return false;
        }

        match &self.search_text {
            Some(text) => file.name.to_lowercase().contains(&text.to_lowercase()),
            None => true,
        }
    }

    pub fn compare(&self, a: &File, b: &File) -> Ordering {
        let ordering = match self.sort.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Name => a.name.cmp(&b.name),
            SortField::Size => a.size.cmp(&b.size),
        };
        match self.sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Evaluates the query over files held in memory. Returns the total match count
    /// and the sorted, limited page.
    pub fn apply<'a, I>(&self, files: I) -> (u64, Vec<File>)
    where
        I: IntoIterator<Item = &'a File>,
    {
        let mut matched: Vec<File> = files
            .into_iter()
            .filter(|f| self.matches(f))
            .cloned()
            .collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let total = matched.len() as u64;
        if let Some(limit) = self.limit {
            matched.truncate(limit as usize);
        }
        (total, matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "u1".into(),
            full_name: "Ada".into(),
            email: "ada@x.com".into(),
            avatar_url: String::new(),
            account_id: "acc1".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn file(id: &str, owner: &str, name: &str, t: FileType, size: i64, shared: &[&str]) -> File {
        let now = Utc::now();
        File {
            id: id.into(),
            name: name.into(),
            extension: String::new(),
            file_type: t,
            url: String::new(),
            size,
            owner_id: owner.into(),
            account_id: String::new(),
            shared_user_emails: shared.iter().map(|s| s.to_string()).collect(),
            bucket_file_id: format!("blob-{}", id),
            created_at: now + Duration::seconds(size),
            updated_at: now,
        }
    }

    #[test]
    fn test_sort_token_parsing() {
        assert_eq!(SortSpec::parse(""), SortSpec::default());
        assert_eq!(
            SortSpec::parse("size-asc"),
            SortSpec {
                field: SortField::Size,
                direction: SortDirection::Asc
            }
        );
        assert_eq!(
            SortSpec::parse("$createdAt-desc"),
            SortSpec {
                field: SortField::CreatedAt,
                direction: SortDirection::Desc
            }
        );
        assert_eq!(SortSpec::parse("name-sideways").direction, SortDirection::Desc);
        assert_eq!(SortSpec::parse("color-asc").field, SortField::CreatedAt);
        assert_eq!(SortSpec::parse("name").field, SortField::Name);
    }

    #[test]
    fn test_build_query_is_additive() {
        let q = build_query(&user(), &[FileType::Image], "report", "size-asc", Some(10));
        assert_eq!(
            q.visibility,
            Visibility::OwnedOrSharedWith {
                user_id: "u1".into(),
                email: "ada@x.com".into()
            }
        );
        assert_eq!(q.types, vec![FileType::Image]);
        assert_eq!(q.search_text.as_deref(), Some("report"));
        assert_eq!(q.limit, Some(10));

        let q = build_query(&user(), &[], "", "", None);
        assert!(q.types.is_empty());
        assert!(q.search_text.is_none());
        assert_eq!(q.sort, SortSpec::default());
    }

    #[test]
    fn test_visibility_owner_or_shared() {
        let files = vec![
            file("1", "u1", "mine.png", FileType::Image, 1, &[]),
            file("2", "u2", "shared.png", FileType::Image, 2, &["ada@x.com"]),
            file("3", "u2", "hidden.png", FileType::Image, 3, &["bob@x.com"]),
        ];
        let q = build_query(&user(), &[], "", "", None);
        let (total, docs) = q.apply(&files);
        assert_eq!(total, 2);
        assert!(docs.iter().all(|f| f.is_visible_to(&user())));

        let (total, docs) = FileQuery::owned_by("u1").apply(&files);
        assert_eq!(total, 1);
        assert_eq!(docs[0].id, "1");
    }

    #[test]
    fn test_type_filter_search_sort_and_limit() {
        let files = vec![
            file("1", "u1", "Q1 Report.pdf", FileType::Document, 30, &[]),
            file("2", "u1", "holiday.mp4", FileType::Video, 10, &[]),
            file("3", "u1", "report-draft.png", FileType::Image, 20, &[]),
            file("4", "u1", "song.mp3", FileType::Audio, 5, &[]),
        ];

        let q = build_query(&user(), &[FileType::Image, FileType::Video], "", "", None);
        let (_, docs) = q.apply(&files);
        assert!(docs
            .iter()
            .all(|f| matches!(f.file_type, FileType::Image | FileType::Video)));

        let q = build_query(&user(), &[], "report", "", None);
        let (total, docs) = q.apply(&files);
        assert_eq!(total, 2);
        assert!(docs.iter().all(|f| f.name.to_lowercase().contains("report")));

        let q = build_query(&user(), &[], "", "size-asc", None);
        let (_, docs) = q.apply(&files);
        assert!(docs.windows(2).all(|w| w[0].size <= w[1].size));

        let q = build_query(&user(), &[], "", "size-desc", Some(2));
        let (total, docs) = q.apply(&files);
        assert_eq!(total, 4);
        assert_eq!(docs.len(), 2);
        assert!(docs.windows(2).all(|w| w[0].size >= w[1].size));
    }
}
