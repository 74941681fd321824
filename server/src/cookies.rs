use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse as _, Response},
};
use tower_cookies::cookie::SameSite;
use tracing::error;

pub use tower_cookies::Cookie;

use crate::state::AppState;

/// First-party flow: CSRF state and PKCE verifier.
pub const STATE_COOKIE: &str = "gk_state";
pub const CODE_VERIFIER_COOKIE: &str = "gk_code_verifier";

/// Third-party flow: CSRF state and the provider-id hint for the callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const OAUTH_PROVIDER_COOKIE: &str = "oauth_provider_id";

/// All transient cookies are scoped to the auth endpoints.
const AUTH_COOKIE_PATH: &str = "/api/auth";

/// A transient secret only has to survive the round trip to the provider.
const TRANSIENT_TTL: time::Duration = time::Duration::minutes(10);

/// Cookie access for the auth flows. Transient secrets go through the
/// private (encrypted + authenticated) jar; the session cookie is sealed
/// separately and stored as-is.
pub struct CookieJar {
    cookies: tower_cookies::Cookies,
    state: AppState,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CookieJar {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = match tower_cookies::Cookies::from_request_parts(parts, state).await {
            Ok(cookies) => cookies,
            Err(_) => {
                error!("Failed to extract cookies from request");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        };

        Ok(CookieJar {
            cookies,
            state: state.clone(),
        })
    }
}

impl CookieJar {
    /// Write a transient secret: httpOnly, SameSite=Strict, path-scoped,
    /// bounded expiry. Writing under an existing name overwrites the prior
    /// value, cancelling any in-flight flow for this client.
    pub fn set_transient(&self, name: &'static str, value: &str) {
        let mut cookie = Cookie::new(name, value.to_owned());
        cookie.set_path(AUTH_COOKIE_PATH);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Strict);
        cookie.set_secure(self.state.secure_cookies());
        cookie.set_max_age(TRANSIENT_TTL);

        self.cookies.private(&self.state.cookie_key).add(cookie);
    }

    /// Read a transient secret and delete it in the same step. A secret is
    /// valid for exactly one read; a second take returns `None`.
    pub fn take_transient(&self, name: &'static str) -> Option<String> {
        let private = self.cookies.private(&self.state.cookie_key);
        let cookie = private.get(name)?;
        let value = cookie.value().to_owned();

        let mut removal = Cookie::new(name, "");
        removal.set_path(AUTH_COOKIE_PATH);
        private.remove(removal);

        Some(value)
    }

    /// Add a cookie outside the private jar.
    pub fn add_plain(&self, cookie: Cookie<'static>) {
        self.cookies.add(cookie);
    }

    /// Get a cookie from outside the private jar.
    pub fn get_plain(&self, name: &str) -> Option<Cookie<'static>> {
        self.cookies.get(name).map(Cookie::into_owned)
    }

    /// Removes the `cookie` from the jar.
    pub fn remove_plain(&self, cookie: Cookie<'static>) {
        self.cookies.remove(cookie);
    }
}
