use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cookies::{CookieJar, OAUTH_PROVIDER_COOKIE, OAUTH_STATE_COOKIE};
use crate::errors::{AuthFlowError, ServerResult, WithStatus as _};
use crate::oauth::{self, pkce, token::TokenExchange, StoredSecrets};
use crate::session;
use crate::state::AppState;

/// Where the browser lands after a federated login.
const POST_LOGIN_REDIRECT: &str = "/dashboard";

/// Failed callbacks bounce back to the login page with an error code.
const LOGIN_ERROR_PATH: &str = "/login";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginExternalLoginRequest {
    oauth_provider_id: String,
}

/// Start a "Sign in with GitHub" flow. The provider's client id and
/// redirect URI come from the identity service; if that lookup fails there
/// is nothing to redirect to, so the flow dies here with no cookies set.
pub async fn begin(
    State(state): State<AppState>,
    cookies: CookieJar,
    Json(body): Json<BeginExternalLoginRequest>,
) -> ServerResult<Response, StatusCode> {
    let provider = match state
        .gatekeeper
        .oauth_provider(&body.oauth_provider_id)
        .await
    {
        Ok(provider) => provider,
        Err(err) => {
            error!(error = %err, "failed to fetch OAuth provider credentials");
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Could not retrieve OAuth provider details."
                })),
            )
                .into_response());
        }
    };

    let state_token = pkce::generate_state();

    #[derive(Serialize)]
    struct ProviderAuthorizeQuery<'a> {
        client_id: &'a str,
        redirect_uri: &'a str,
        scope: &'a str,
        state: &'a str,
    }

    let query = serde_urlencoded::to_string(ProviderAuthorizeQuery {
        client_id: &provider.client_id,
        redirect_uri: &provider.redirect_uri,
        scope: &state.github.scope,
        state: &state_token,
    })
    .map_err(color_eyre::Report::from)
    .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    cookies.set_transient(OAUTH_STATE_COOKIE, &state_token);
    cookies.set_transient(OAUTH_PROVIDER_COOKIE, &body.oauth_provider_id);

    let url = format!("{}?{}", state.github.authorize_url, query);

    info!(provider = %provider.name, "issued third-party authorization request");
    Ok(Json(serde_json::json!({ "url": url })).into_response())
}

#[derive(Deserialize)]
pub struct ExternalCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Third-party callback: same validation state machine as the first-party
/// flow, but without PKCE, and failures redirect to the login page instead
/// of answering with a status code.
pub async fn callback(
    State(state): State<AppState>,
    cookies: CookieJar,
    Query(params): Query<ExternalCallbackParams>,
) -> Response {
    // Clean up the temporary cookies immediately
    let stored = StoredSecrets {
        state: cookies.take_transient(OAUTH_STATE_COOKIE),
        code_verifier: None,
    };
    let provider_id = cookies.take_transient(OAUTH_PROVIDER_COOKIE);

    let Some(provider_id) = provider_id else {
        return error_redirect(AuthFlowError::InvalidState);
    };

    if let Err(err) = oauth::validate_callback(&stored, params.state.as_deref(), None) {
        return error_redirect(err);
    }

    let Some(code) = params.code else {
        return error_redirect(AuthFlowError::MissingCode);
    };

    let provider = match state.gatekeeper.oauth_provider(&provider_id).await {
        Ok(provider) => provider,
        Err(err) => return error_redirect(err),
    };

    let exchange = TokenExchange::ThirdParty {
        http: &state.http,
        provider: &provider,
        github: &state.github,
    };

    let session = match exchange.exchange(&code).await {
        Ok(session) => session,
        Err(err) => return error_redirect(err),
    };

    if let Err(err) = session::create_session_and_set_cookie(&state, &cookies, &session).await {
        return error_redirect(err);
    }

    info!(user_id = %session.user_id, "third-party login complete");
    Redirect::to(POST_LOGIN_REDIRECT).into_response()
}

fn error_redirect(err: AuthFlowError) -> Response {
    error!(error = %err, "external login callback failed");
    Redirect::to(&format!(
        "{LOGIN_ERROR_PATH}?error={}",
        err.redirect_code()
    ))
    .into_response()
}
