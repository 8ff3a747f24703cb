use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use rust_file_drive::backend::memory::MemoryBackend;
use rust_file_drive::backend::sql::SqlBackend;
use rust_file_drive::backend::Backend;
use rust_file_drive::config::AppConfig;
use rust_file_drive::infrastructure::{database, storage};
use rust_file_drive::services::mailer::{LogMailer, OtpMailer, WebhookMailer};
use rust_file_drive::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// sea-orm database plus S3-compatible object storage
    Sql,
    /// Everything in process memory, lost on exit
    Memory,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Where identity, metadata and blobs live
    #[arg(short, long, value_enum, default_value_t = BackendKind::Sql)]
    backend: BackendKind,
}

async fn build_backend(kind: BackendKind, config: &AppConfig) -> anyhow::Result<Backend> {
    match kind {
        BackendKind::Memory => {
            warn!("🧪 Using the in-memory backend; data is lost on exit");
            Ok(Backend::in_memory(Arc::new(MemoryBackend::with_ttls(
                config.otp_ttl(),
                config.session_ttl(),
            ))))
        }
        BackendKind::Sql => {
            let db_url = std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://drive.db?mode=rwc".to_string());
            let db = database::setup_database(&db_url).await?;

            let mailer: Arc<dyn OtpMailer> = match &config.otp_webhook_url {
                Some(url) => {
                    info!("📮 OTP delivery via webhook {}", url);
                    Arc::new(WebhookMailer::new(url.clone()))
                }
                None => {
                    warn!("📮 OTP_WEBHOOK_URL not set, passcodes are written to the log");
                    Arc::new(LogMailer)
                }
            };

            let sql = Arc::new(SqlBackend::new(
                db,
                mailer,
                config.otp_ttl(),
                config.session_ttl(),
            ));
            let blobs = storage::setup_storage().await?;
            if let Err(e) = blobs.ensure_bucket().await {
                warn!("⚠️  Could not verify bucket: {}", e);
            }

            Ok(Backend::new(sql.clone(), sql, blobs))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_file_drive=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust File Drive [Backend: {:?}]...", args.backend);

    let config = AppConfig::from_env();
    info!(
        "🛡️  Config: Max Size={}MB, OTP TTL={}m, Session TTL={}d, Public URL={}",
        config.max_file_size / 1024 / 1024,
        config.otp_ttl_minutes,
        config.session_ttl_days,
        config.public_base_url
    );

    let backend = build_backend(args.backend, &config).await?;
    let state = AppState::new(backend, config);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
