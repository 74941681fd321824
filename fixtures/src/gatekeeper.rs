//! Stub of the GateKeeper identity-service API: the two endpoints the
//! dashboard's auth flows consume, with canned data.

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// The one OAuth provider this fixture knows about.
pub const PROVIDER_ID: &str = "3f1e8a0c-5b2d-4f6e-9c7a-1d2e3f4a5b6c";
pub const PROVIDER_CLIENT_ID: &str = "Iv1.fixture-client";
pub const PROVIDER_CLIENT_SECRET: &str = "fixture-provider-secret";
pub const PROVIDER_REDIRECT_URI: &str =
    "http://localhost:3000/api/auth/external-login/callback";

/// The only authorization code the sign-in endpoint accepts.
pub const VALID_AUTHORIZATION_CODE: &str = "gk-fixture-code";

pub const USER_ID: &str = "d0a0f3c2-8e4b-4f1a-9b6d-2c5e7f8a9b0c";
pub const ACCESS_TOKEN: &str = "gk-fixture-access-token";

pub fn router() -> Router {
    Router::new()
        .route(
            "/v1/auth/application/oauth-provider/:id",
            get(oauth_provider),
        )
        .route("/v1/auth/sign-in", post(sign_in))
}

async fn oauth_provider(Path(id): Path<String>) -> impl IntoResponse {
    if id != PROVIDER_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "title": "OAuth provider not found",
                "message": "No OAuth provider is registered under this id",
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "id": PROVIDER_ID,
            "name": "github",
            "enabled": true,
            "applicationId": "11111111-2222-3333-4444-555555555555",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": null,
            "clientId": PROVIDER_CLIENT_ID,
            "clientSecret": PROVIDER_CLIENT_SECRET,
            "redirectUri": PROVIDER_REDIRECT_URI,
        })),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInGrant {
    grant_type: String,
    authorization_code: String,
    #[allow(dead_code)]
    redirect_uri: String,
    #[allow(dead_code)]
    client_id: String,
    client_secret: String,
    code_verifier: String,
}

async fn sign_in(Json(grant): Json<SignInGrant>) -> impl IntoResponse {
    if grant.grant_type != "authorization_code"
        || grant.client_secret.is_empty()
        || grant.code_verifier.is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "title": "Invalid PKCE",
                "message": "The grant is missing required parameters",
            })),
        );
    }

    if grant.authorization_code != VALID_AUTHORIZATION_CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "title": "Authorization code not found",
                "message": "Authorization code not found",
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "user": {
                "id": USER_ID,
                "displayName": "Fixture User",
                "firstName": "Fixture",
                "lastName": "User",
                "email": "fixture@example.com",
                "photoUrl": null,
                "createdAt": "2025-01-01T00:00:00Z",
                "applicationId": "11111111-2222-3333-4444-555555555555",
            },
            "accessToken": ACCESS_TOKEN,
            "refreshToken": Uuid::new_v4(),
        })),
    )
}
