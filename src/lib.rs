pub mod api;
pub mod backend;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;
pub mod views;

use crate::backend::Backend;
use crate::config::AppConfig;
use crate::services::file_service::FileService;
use crate::services::revalidation::Revalidator;
use crate::services::session::UserService;
use crate::services::usage::UsageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::sign_up,
        api::handlers::auth::sign_in,
        api::handlers::auth::send_otp,
        api::handlers::auth::verify,
        api::handlers::auth::logout,
        api::handlers::users::get_current_user,
        api::handlers::files::list_files,
        api::handlers::files::upload_file,
        api::handlers::files::rename_file,
        api::handlers::files::update_file_users,
        api::handlers::files::delete_file,
        api::handlers::files::get_usage,
        api::handlers::storage::view_blob,
        api::handlers::storage::download_blob,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::SignUpRequest,
            api::handlers::auth::EmailRequest,
            api::handlers::auth::VerifyRequest,
            api::handlers::auth::VerifyResponse,
            api::handlers::files::RenameRequest,
            api::handlers::files::ShareRequest,
            api::handlers::files::UsageResponse,
            api::handlers::health::HealthResponse,
            services::usage::UsageTotals,
            services::usage::TypeUsage,
            services::usage::UsageCard,
            models::FileType,
            models::User,
            models::File,
            models::FileList,
            models::AccountRef,
            models::SignInOutcome,
            models::DeleteStatus,
        )
    ),
    tags(
        (name = "auth", description = "Passcode sign-up, sign-in and sessions"),
        (name = "users", description = "Current user"),
        (name = "files", description = "File listing, upload, rename, share and delete"),
        (name = "storage", description = "File contents"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub users: Arc<UserService>,
    pub files: Arc<FileService>,
    pub usage: Arc<UsageService>,
    pub revalidator: Arc<Revalidator>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(backend: Backend, config: AppConfig) -> Self {
        let revalidator = Arc::new(Revalidator::new());
        Self {
            users: Arc::new(UserService::new(
                backend.clone(),
                config.avatar_placeholder_url.clone(),
            )),
            files: Arc::new(FileService::new(
                backend.clone(),
                revalidator.clone(),
                config.public_base_url.clone(),
                config.max_file_size,
            )),
            usage: Arc::new(UsageService::new(backend.clone())),
            backend,
            revalidator,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    // Cookies require explicit origins, methods and headers
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            header::HeaderName::from_static(api::handlers::files::PATH_REVISION_HEADER),
            api::middleware::request_id::REQUEST_ID_HEADER,
        ])
        .allow_credentials(true)
}

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/users/me", get(api::handlers::users::get_current_user))
        .route(
            "/files",
            get(api::handlers::files::list_files).post(api::handlers::files::upload_file),
        )
        .route("/files/usage", get(api::handlers::files::get_usage))
        .route("/files/:id", delete(api::handlers::files::delete_file))
        .route("/files/:id/rename", put(api::handlers::files::rename_file))
        .route(
            "/files/:id/users",
            put(api::handlers::files::update_file_users),
        )
        .route(
            "/storage/:blob_id/view",
            get(api::handlers::storage::view_blob),
        )
        .route(
            "/storage/:blob_id/download",
            get(api::handlers::storage::download_blob),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/sign-up", post(api::handlers::auth::sign_up))
        .route("/auth/sign-in", post(api::handlers::auth::sign_in))
        .route("/auth/otp", post(api::handlers::auth::send_otp))
        .route("/auth/verify", post(api::handlers::auth::verify))
        .route("/auth/logout", post(api::handlers::auth::logout))
        .merge(protected)
        .layer(DefaultBodyLimit::max(
            state.config.max_file_size + 1024 * 1024, // multipart overhead
        ))
        .layer(cors_layer(&state.config))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
