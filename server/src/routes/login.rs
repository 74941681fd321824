use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::cookies::{CookieJar, CODE_VERIFIER_COOKIE, STATE_COOKIE};
use crate::errors::{AuthFlowError, ServerResult, WithStatus as _};
use crate::oauth::{self, token::TokenExchange, AuthorizationRequest, StoredSecrets};
use crate::session;
use crate::state::AppState;

const DEFAULT_SCOPE: &str = "openid profile email";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginLoginRequest {
    redirect_uri: String,
    scope: Option<String>,
}

/// Start a first-party login: mint PKCE material and a state token, stash
/// both in transient cookies, and hand the hosted sign-in URL back to the
/// caller. The browser is redirected by the frontend, not by us.
pub async fn begin(
    State(state): State<AppState>,
    cookies: CookieJar,
    Json(body): Json<BeginLoginRequest>,
) -> ServerResult<Response, StatusCode> {
    let request = AuthorizationRequest::new(
        &state.config.client_id,
        &body.redirect_uri,
        body.scope.as_deref().unwrap_or(DEFAULT_SCOPE),
    );

    let url = request
        .authorize_url(&state.config.sign_in_page())
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    cookies.set_transient(STATE_COOKIE, &request.state);
    cookies.set_transient(CODE_VERIFIER_COOKIE, &request.code_verifier);

    info!("issued first-party authorization request");
    Ok(Json(serde_json::json!({ "url": url })).into_response())
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub redirect_uri: Option<String>,
    #[allow(dead_code)]
    pub client_id: Option<String>,
    pub code_challenge: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// First-party callback: consume the transient secrets, validate state and
/// challenge, exchange the code with GateKeeper, seal the session. Every
/// failure stops before the next step; nothing is retried.
pub async fn callback(
    State(state): State<AppState>,
    cookies: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    // Consume the secrets before any verdict so a replayed callback always
    // fails, whatever else happens below.
    let stored = StoredSecrets {
        state: cookies.take_transient(STATE_COOKIE),
        code_verifier: cookies.take_transient(CODE_VERIFIER_COOKIE),
    };

    if let Some(error) = params.error {
        error!(
            error = %error,
            description = ?params.error_description,
            "authorization server returned an error"
        );
        return (StatusCode::BAD_REQUEST, format!("Authorization failed: {error}"))
            .into_response();
    }

    let code = match params.code {
        Some(code) => code,
        None => return AuthFlowError::MissingCode.into_response(),
    };

    if let Err(err) = oauth::validate_callback(
        &stored,
        params.state.as_deref(),
        params.code_challenge.as_deref(),
    ) {
        return err.into_response();
    }

    // Validation guarantees the verifier was stored
    let Some(code_verifier) = stored.code_verifier else {
        return AuthFlowError::InvalidCodeChallenge.into_response();
    };

    let destination = params.redirect_uri.unwrap_or_else(|| "/".to_string());

    let exchange = TokenExchange::FirstParty {
        gatekeeper: &state.gatekeeper,
        client_id: &state.config.client_id,
        client_secret: &state.config.client_secret,
        redirect_uri: &destination,
        code_verifier: &code_verifier,
    };

    let session = match exchange.exchange(&code).await {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };

    if let Err(err) = session::create_session_and_set_cookie(&state, &cookies, &session).await {
        return err.into_response();
    }

    info!(user_id = %session.user_id, "first-party login complete");
    Redirect::to(&destination).into_response()
}
