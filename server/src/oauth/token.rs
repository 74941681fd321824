use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::AuthFlowError;
use crate::gatekeeper::{GateKeeperClient, OAuthProviderCredentials, SignInGrant};
use crate::session::Session;
use crate::state::GitHubConfig;

/// How a validated authorization code turns into a session. Both flows
/// share the callback state machine; only the exchange step differs.
pub enum TokenExchange<'a> {
    /// PKCE grant against the GateKeeper identity service.
    FirstParty {
        gatekeeper: &'a GateKeeperClient,
        client_id: &'a str,
        client_secret: &'a str,
        redirect_uri: &'a str,
        code_verifier: &'a str,
    },
    /// Classic server-side OAuth against a federated provider, followed by
    /// a profile fetch with the returned access token.
    ThirdParty {
        http: &'a reqwest::Client,
        provider: &'a OAuthProviderCredentials,
        github: &'a GitHubConfig,
    },
}

#[derive(Serialize)]
struct ProviderTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct ProviderTokenResponse {
    access_token: String,
}

/// The subset of the provider's user-profile payload we keep.
#[derive(Debug, Deserialize)]
pub struct ProviderUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl TokenExchange<'_> {
    /// Swap the authorization code for a session payload. Failures never
    /// leave partial state behind; the caller decides how to surface them.
    pub async fn exchange(&self, code: &str) -> Result<Session, AuthFlowError> {
        match self {
            TokenExchange::FirstParty {
                gatekeeper,
                client_id,
                client_secret,
                redirect_uri,
                code_verifier,
            } => {
                let response = gatekeeper
                    .sign_in(SignInGrant {
                        grant_type: "authorization_code",
                        authorization_code: code,
                        redirect_uri,
                        client_id,
                        client_secret,
                        code_verifier,
                    })
                    .await?;

                Ok(Session::from_gatekeeper(response))
            }
            TokenExchange::ThirdParty {
                http,
                provider,
                github,
            } => {
                let access_token = fetch_provider_token(http, provider, github, code).await?;
                let user = fetch_provider_user(http, github, &access_token).await?;

                Ok(Session::from_provider(&provider.name, user, access_token))
            }
        }
    }
}

/// `POST` the provider's token endpoint with the client credentials and the
/// code. The client secret only ever travels server-to-server.
async fn fetch_provider_token(
    http: &reqwest::Client,
    provider: &OAuthProviderCredentials,
    github: &GitHubConfig,
    code: &str,
) -> Result<String, AuthFlowError> {
    let response = http
        .post(&github.token_url)
        .header(header::ACCEPT, "application/json")
        .json(&ProviderTokenRequest {
            client_id: &provider.client_id,
            client_secret: &provider.client_secret,
            code,
        })
        .send()
        .await
        .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "provider token exchange failed");
        return Err(AuthFlowError::InvalidCode);
    }

    let token = response
        .json::<ProviderTokenResponse>()
        .await
        .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))?;

    Ok(token.access_token)
}

async fn fetch_provider_user(
    http: &reqwest::Client,
    github: &GitHubConfig,
    access_token: &str,
) -> Result<ProviderUser, AuthFlowError> {
    let response = http
        .get(&github.user_api_url)
        .bearer_auth(access_token)
        .header(header::USER_AGENT, "gk-dashboard")
        .send()
        .await
        .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        error!(status = %status, "provider user-profile fetch failed");
        return Err(AuthFlowError::UpstreamUnavailable(format!(
            "profile fetch returned {status}"
        )));
    }

    response
        .json::<ProviderUser>()
        .await
        .map_err(|e| AuthFlowError::UpstreamUnavailable(e.to_string()))
}
