use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// File metadata. Share recipients live in `file_shares`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// `name` lowercased, matched by name search
    pub search_name: String,
    pub extension: String,
    pub file_type: String,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub size: i64,
    pub owner_id: String,
    pub account_id: String,
    #[sea_orm(unique)]
    pub bucket_file_id: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::file_shares::Entity")]
    FileShares,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::file_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileShares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_file(self, shared_user_emails: Vec<String>) -> crate::models::File {
        let file_type = self
            .file_type
            .parse()
            .unwrap_or(crate::models::FileType::Other);
        crate::models::File {
            id: self.id,
            name: self.name,
            extension: self.extension,
            file_type,
            url: self.url,
            size: self.size,
            owner_id: self.owner_id,
            account_id: self.account_id,
            shared_user_emails,
            bucket_file_id: self.bucket_file_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
