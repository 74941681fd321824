//! Stub of GitHub's OAuth endpoints: the token exchange and the user
//! profile API.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::gatekeeper::{PROVIDER_CLIENT_ID, PROVIDER_CLIENT_SECRET};

/// The only code the token endpoint accepts.
pub const VALID_PROVIDER_CODE: &str = "gh-fixture-code";
pub const ACCESS_TOKEN: &str = "gho_fixture_token";

pub const USER_ID: i64 = 583_231;
pub const USER_LOGIN: &str = "octocat";

pub fn router() -> Router {
    Router::new()
        .route("/login/oauth/access_token", post(access_token))
        .route("/user", get(user))
}

#[derive(Deserialize)]
struct TokenRequest {
    client_id: String,
    client_secret: String,
    code: String,
}

async fn access_token(Json(request): Json<TokenRequest>) -> impl IntoResponse {
    if request.client_id != PROVIDER_CLIENT_ID
        || request.client_secret != PROVIDER_CLIENT_SECRET
        || request.code != VALID_PROVIDER_CODE
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "bad_verification_code" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": ACCESS_TOKEN,
            "scope": "read:user,user:email",
            "token_type": "bearer",
        })),
    )
}

async fn user(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {ACCESS_TOKEN}"))
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Requires authentication" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "id": USER_ID,
            "login": USER_LOGIN,
            "name": "The Octocat",
            "email": null,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231",
        })),
    )
}
