use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::errors::AuthFlowError;

/// Typed client for the GateKeeper identity-service API. Only the two
/// endpoints the auth flows consume are modelled here.
#[derive(Clone)]
pub struct GateKeeperClient {
    http: reqwest::Client,
    base_url: String,
}

/// GateKeeper error bodies use a `{title, message}` shape.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub title: String,
    pub message: String,
}

/// Credentials registered for a third-party OAuth provider. The client
/// secret never leaves the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthProviderCredentials {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// The authorization-code grant sent to `POST /v1/auth/sign-in`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInGrant<'a> {
    pub grant_type: &'static str,
    pub authorization_code: &'a str,
    pub redirect_uri: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code_verifier: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user: GateKeeperUser,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateKeeperUser {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl GateKeeperClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /v1/auth/application/oauth-provider/{id}`. Any failure here is
    /// fatal to the flow that asked: without credentials there is nothing
    /// to redirect to or exchange against.
    pub async fn oauth_provider(
        &self,
        provider_id: &str,
    ) -> Result<OAuthProviderCredentials, AuthFlowError> {
        let url = format!(
            "{}/v1/auth/application/oauth-provider/{}",
            self.base_url,
            urlencoding::encode(provider_id)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(body) = response.json::<ApiError>().await {
                error!(
                    status = %status,
                    title = %body.title,
                    message = %body.message,
                    "OAuth provider credential lookup rejected"
                );
            }
            return Err(AuthFlowError::UpstreamUnavailable(format!(
                "oauth provider lookup returned {status}"
            )));
        }

        response
            .json::<OAuthProviderCredentials>()
            .await
            .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))
    }

    /// `POST /v1/auth/sign-in`: swap an authorization code (plus PKCE
    /// verifier and client secret) for a session payload. A non-success
    /// status means the code was rejected; codes are single-use so the
    /// exchange is never retried.
    pub async fn sign_in(&self, grant: SignInGrant<'_>) -> Result<SignInResponse, AuthFlowError> {
        let url = format!("{}/v1/auth/sign-in", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&grant)
            .send()
            .await
            .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            match response.json::<ApiError>().await {
                Ok(body) => error!(
                    status = %status,
                    title = %body.title,
                    message = %body.message,
                    "sign-in grant rejected"
                ),
                Err(_) => error!(status = %status, "sign-in grant rejected"),
            }
            return Err(AuthFlowError::InvalidCode);
        }

        response
            .json::<SignInResponse>()
            .await
            .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))
    }
}
