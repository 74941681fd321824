use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json,
};

use crate::cookies::{CookieJar, CODE_VERIFIER_COOKIE, OAUTH_PROVIDER_COOKIE, OAUTH_STATE_COOKIE, STATE_COOKIE};
use crate::session::{self, AuthUser};
use crate::state::AppState;

pub mod external;
pub mod login;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/healthz", get(health))
        .route("/logout", get(logout))
        // Session introspection for the dashboard shell
        .route("/api/auth/me", get(me))
        // First-party GateKeeper login
        .route("/api/auth/login", post(login::begin))
        .route("/api/auth/callback", get(login::callback))
        // Third-party federation (Sign in with GitHub)
        .route("/api/auth/external-login", post(external::begin))
        .route(
            "/api/auth/external-login/callback",
            get(external::callback),
        )
        .layer(tower_cookies::CookieManagerLayer::new())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health() -> &'static str {
    "OK"
}

/// Who is signed in, minus the tokens: those stay inside the sealed cookie.
async fn me(AuthUser(session): AuthUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "userId": session.user_id,
        "displayName": session.display_name,
        "email": session.email,
        "avatarUrl": session.avatar_url,
        "identitySource": session.identity_source,
        "issuedAt": session.issued_at,
    }))
}

/// Drop the session and any half-finished flow secrets.
async fn logout(State(state): State<AppState>, cookies: CookieJar) -> impl IntoResponse {
    session::clear_session_cookie(&state, &cookies);
    for name in [
        STATE_COOKIE,
        CODE_VERIFIER_COOKIE,
        OAUTH_STATE_COOKIE,
        OAUTH_PROVIDER_COOKIE,
    ] {
        let _ = cookies.take_transient(name);
    }

    Redirect::to("/login")
}
