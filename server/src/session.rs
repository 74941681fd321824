use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse as _, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cookies::{Cookie, CookieJar};
use crate::errors::AuthFlowError;
use crate::gatekeeper::SignInResponse;
use crate::oauth::token::ProviderUser;
use crate::state::AppState;

/// Cookie name for the sealed session.
pub const SESSION_COOKIE: &str = "gk_session";

/// Default session duration in days.
const SESSION_DURATION_DAYS: i64 = 30;

/// Where the user's identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    Gatekeeper,
    Github,
}

/// The session payload sealed into the cookie. The client only ever sees
/// the opaque sealed form; tokens never reach the browser in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub identity_source: IdentitySource,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn from_gatekeeper(response: SignInResponse) -> Self {
        Self {
            user_id: response.user.id.to_string(),
            display_name: response.user.display_name,
            email: response.user.email,
            avatar_url: response.user.photo_url,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            identity_source: IdentitySource::Gatekeeper,
            issued_at: Utc::now(),
        }
    }

    pub fn from_provider(provider_name: &str, user: ProviderUser, access_token: String) -> Self {
        // Only GitHub federation is wired up today
        debug_assert_eq!(provider_name.to_ascii_lowercase(), "github");

        Self {
            user_id: user.id.to_string(),
            display_name: user.name.or(Some(user.login)),
            email: user.email,
            avatar_url: user.avatar_url,
            access_token,
            refresh_token: None,
            identity_source: IdentitySource::Github,
            issued_at: Utc::now(),
        }
    }
}

/// Seal the session and set it as the one session cookie. Sealing failure
/// is fatal and sets nothing.
pub async fn create_session_and_set_cookie(
    state: &AppState,
    cookies: &CookieJar,
    session: &Session,
) -> Result<(), AuthFlowError> {
    let payload = serde_json::to_string(session).map_err(|err| {
        error!(error = %err, "failed to serialize session");
        AuthFlowError::SealingFailure
    })?;

    let sealed = crate::encryption::seal(&payload, &state.encryption.key)
        .await
        .map_err(|err| {
            error!(error = ?err, "failed to seal session");
            AuthFlowError::SealingFailure
        })?;

    let mut cookie = Cookie::new(SESSION_COOKIE, sealed);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(state.secure_cookies());
    cookie.set_max_age(time::Duration::days(SESSION_DURATION_DAYS));
    cookies.add_plain(cookie);

    info!(user_id = %session.user_id, "session established");
    Ok(())
}

/// Read back a session from the cookie, if one is present and intact.
/// Tampered or undecryptable values count as "no session".
pub async fn session_from_cookie(state: &AppState, cookies: &CookieJar) -> Option<Session> {
    let cookie = cookies.get_plain(SESSION_COOKIE)?;

    let payload = match crate::encryption::open(cookie.value(), &state.encryption.key).await {
        Ok(payload) => payload,
        Err(err) => {
            info!(error = ?err, "discarding unreadable session cookie");
            return None;
        }
    };

    match serde_json::from_str(&payload) {
        Ok(session) => Some(session),
        Err(err) => {
            info!(error = %err, "discarding malformed session payload");
            None
        }
    }
}

/// Expire the session cookie.
pub fn clear_session_cookie(state: &AppState, cookies: &CookieJar) {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(state.secure_cookies());
    cookie.set_max_age(time::Duration::seconds(-1));
    cookies.remove_plain(cookie);
}

/// Extractor for handlers that require a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Session);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = CookieJar::from_request_parts(parts, state).await?;

        match session_from_cookie(state, &cookies).await {
            Some(session) => Ok(AuthUser(session)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "title": "Not signed in",
                    "message": "No valid session was found for this request",
                })),
            )
                .into_response()),
        }
    }
}
