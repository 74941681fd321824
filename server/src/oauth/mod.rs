pub mod pkce;
pub mod token;

use serde::Serialize;

use crate::errors::AuthFlowError;

/// Everything minted at initiation for one authorization flow. `state` and
/// `code_verifier` are persisted server-side (transient cookies) until the
/// callback consumes them; the rest travels in the redirect URL and is
/// round-tripped by the provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
    pub redirect_uri: String,
    pub scope: String,
    pub response_type: String,
    pub client_id: String,
}

impl AuthorizationRequest {
    pub fn new(client_id: &str, redirect_uri: &str, scope: &str) -> Self {
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::derive_code_challenge(&code_verifier);

        Self {
            state: pkce::generate_state(),
            code_verifier,
            code_challenge,
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            response_type: "code".to_string(),
            client_id: client_id.to_string(),
        }
    }

    /// Build the URL of the hosted sign-in page with all flow parameters in
    /// the query string. The caller redirects the browser; we never do.
    pub fn authorize_url(&self, sign_in_page: &str) -> color_eyre::Result<String> {
        #[derive(Serialize)]
        struct AuthorizeQuery<'a> {
            redirect_uri: &'a str,
            response_type: &'a str,
            scope: &'a str,
            code_challenge_method: &'a str,
            code_challenge: &'a str,
            state: &'a str,
        }

        let query = serde_urlencoded::to_string(AuthorizeQuery {
            redirect_uri: &self.redirect_uri,
            response_type: &self.response_type,
            scope: &self.scope,
            code_challenge_method: pkce::CHALLENGE_METHOD,
            code_challenge: &self.code_challenge,
            state: &self.state,
        })?;

        Ok(format!("{sign_in_page}?{query}"))
    }
}

/// What survived in the transient cookies between initiation and callback.
/// Both fields are read-once: building this consumes the cookies, so a
/// replayed callback sees `None` and fails closed.
#[derive(Debug, Default)]
pub struct StoredSecrets {
    pub state: Option<String>,
    pub code_verifier: Option<String>,
}

/// Validate callback parameters against the stored secrets. Runs the PKCE
/// check (when a verifier was stored) and the CSRF state check; only a
/// fully valid callback may proceed to token exchange. Short-circuits on
/// the first failure, and never has side effects of its own.
pub fn validate_callback(
    stored: &StoredSecrets,
    presented_state: Option<&str>,
    presented_challenge: Option<&str>,
) -> Result<(), AuthFlowError> {
    if let Some(verifier) = stored.code_verifier.as_deref() {
        let expected = pkce::derive_code_challenge(verifier);
        match presented_challenge {
            Some(challenge) if challenge == expected => {}
            _ => return Err(AuthFlowError::InvalidCodeChallenge),
        }
    } else if presented_challenge.is_some() {
        // A challenge arrived but we never stored a verifier: this callback
        // does not belong to a flow we initiated.
        return Err(AuthFlowError::InvalidCodeChallenge);
    }

    match (presented_state, stored.state.as_deref()) {
        (Some(presented), Some(stored)) if presented == stored => Ok(()),
        _ => Err(AuthFlowError::InvalidState),
    }
}
