//! Authentication token minting is out of scope (spec.md §1): this is the
//! stub a real identity provider would sit behind. It hands back the
//! caller's id as a bearer claim, which [`crate::auth::AuthenticatedUser`]
//! then trusts on every subsequent request.

use {
    axum::Json,
    model::ids::UserId,
    serde::{Deserialize, Serialize},
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub user_id: UserId,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
}

pub async fn login(Json(body): Json<LoginRequest>) -> Json<LoginResponse> {
    Json(LoginResponse {
        token: body.user_id.get().to_string(),
        user_id: body.user_id,
    })
}
