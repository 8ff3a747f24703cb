use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::{SESSION_COOKIE, removal_cookie, session_cookie};
use crate::models::{AccountRef, SignInOutcome};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(min = 2, max = 50, message = "Full name must be 2 to 50 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[validate(length(min = 1, message = "Account id is required"))]
    pub account_id: String,
    #[validate(length(min = 1, max = 32, message = "Passcode is required"))]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub session_id: String,
}

fn trimmed_email(email: &str) -> String {
    email.trim().to_string()
}

#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Passcode sent, account created if new", body = AccountRef),
        (status = 400, description = "Invalid name or email")
    ),
    tag = "auth"
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(mut req): Json<SignUpRequest>,
) -> Result<Json<AccountRef>, AppError> {
    req.email = trimmed_email(&req.email);
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let account = state.users.create_account(&req.full_name, &req.email).await?;
    Ok(Json(account))
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Passcode sent, or an error field for unknown users", body = SignInOutcome),
        (status = 400, description = "Invalid email")
    ),
    tag = "auth"
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(mut req): Json<EmailRequest>,
) -> Result<Json<SignInOutcome>, AppError> {
    req.email = trimmed_email(&req.email);
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(state.users.sign_in_user(&req.email).await?))
}

#[utoipa::path(
    post,
    path = "/auth/otp",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Passcode sent", body = AccountRef),
        (status = 400, description = "Invalid email")
    ),
    tag = "auth"
)]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(mut req): Json<EmailRequest>,
) -> Result<Json<AccountRef>, AppError> {
    req.email = trimmed_email(&req.email);
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let account_id = state.users.send_email_otp(&req.email).await?;
    Ok(Json(AccountRef { account_id }))
}

#[utoipa::path(
    post,
    path = "/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Session created, cookie set", body = VerifyResponse),
        (status = 401, description = "Invalid or expired passcode")
    ),
    tag = "auth"
)]
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<VerifyRequest>,
) -> Result<(CookieJar, Json<VerifyResponse>), AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let session = state
        .users
        .verify_secret(&req.account_id, &req.password)
        .await?;

    Ok((
        jar.add(session_cookie(session.secret)),
        Json(VerifyResponse {
            session_id: session.id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 303, description = "Session cleared, redirected to /sign-in")
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        // Errors are logged by the service; the cookie goes regardless
        let _ = state.users.logout_user(cookie.value()).await;
    }
    (jar.remove(removal_cookie()), Redirect::to("/sign-in"))
}
