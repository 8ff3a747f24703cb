use crate::entities::{accounts, email_tokens, file_shares, files, sessions, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates any missing table from the entity definitions.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Parents before children: accounts -> tokens/sessions, users -> files -> file_shares
    let stmts = vec![
        (
            "accounts",
            schema
                .create_table_from_entity(accounts::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "email_tokens",
            schema
                .create_table_from_entity(email_tokens::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "sessions",
            schema
                .create_table_from_entity(sessions::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "files",
            schema
                .create_table_from_entity(files::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "file_shares",
            schema
                .create_table_from_entity(file_shares::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
        info!("   - Table '{}' checked/created", name);
    }

    // Columns added after the first release; create_table_from_entity never alters a table
    let schema_updates = [
        "ALTER TABLE email_tokens ADD COLUMN IF NOT EXISTS attempts INTEGER NOT NULL DEFAULT 0",
        "ALTER TABLE files ADD COLUMN IF NOT EXISTS search_name VARCHAR(255) NOT NULL DEFAULT ''",
        "UPDATE files SET search_name = LOWER(name) WHERE search_name = ''",
    ];

    let is_sqlite = builder == sea_orm::DatabaseBackend::Sqlite;

    for query in schema_updates {
        // SQLite has no ADD COLUMN IF NOT EXISTS
        let query = if is_sqlite {
            query.replace(" IF NOT EXISTS", "")
        } else {
            query.to_owned()
        };

        match db
            .execute(sea_orm::Statement::from_string(builder, query.clone()))
            .await
        {
            Ok(_) => tracing::debug!("   - Executed schema update: {}", query),
            Err(e) if e.to_string().to_lowercase().contains("duplicate column") => {
                tracing::debug!("   - Column already present (skipped): {}", query);
            }
            Err(e) => tracing::warn!("   - Schema update warning: {} -> {}", query, e),
        }
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_files_owner_id ON files(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_file_shares_email ON file_shares(email)",
        "CREATE INDEX IF NOT EXISTS idx_email_tokens_account_id ON email_tokens(account_id)",
    ];

    for query in indexes {
        if let Err(e) = db
            .execute(sea_orm::Statement::from_string(builder, query.to_owned()))
            .await
        {
            tracing::warn!("   - Index creation warning: {} -> {}", query, e);
        }
    }

    Ok(())
}
