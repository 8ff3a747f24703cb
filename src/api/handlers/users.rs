use crate::models::User;
use axum::{Extension, Json};

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The signed-in user", body = User),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn get_current_user(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
