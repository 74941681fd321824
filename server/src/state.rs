use std::env;
use std::str::FromStr as _;
use std::sync::Arc;

use age::x25519::Identity;
use color_eyre::eyre::{eyre, WrapErr as _};
use tower_cookies::Key;

use crate::gatekeeper::GateKeeperClient;

/// Outbound calls must not hold a callback open indefinitely.
const OUTBOUND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Registration of this dashboard with the GateKeeper identity service.
#[derive(Clone)]
pub struct GateKeeperConfig {
    /// Base URL of the GateKeeper REST API.
    pub api_base_url: String,
    /// Base URL of the hosted login/sign-up pages.
    pub auth_base_url: String,
    /// The application id GateKeeper knows us by.
    pub client_id: String,
    pub client_secret: String,
}

impl GateKeeperConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let api_base_url = env::var("GATEKEEPER_BASE_URL")
            .wrap_err("GATEKEEPER_BASE_URL environment variable not set")?;
        let auth_base_url = env::var("GATEKEEPER_AUTH_URL").unwrap_or_else(|_| api_base_url.clone());

        Ok(Self {
            api_base_url,
            auth_base_url,
            client_id: env::var("GATEKEEPER_CLIENT_ID")
                .wrap_err("GATEKEEPER_CLIENT_ID environment variable not set")?,
            client_secret: env::var("GATEKEEPER_CLIENT_SECRET")
                .wrap_err("GATEKEEPER_CLIENT_SECRET environment variable not set")?,
        })
    }

    /// The hosted sign-in page users are handed off to.
    pub fn sign_in_page(&self) -> String {
        format!(
            "{}/auth/{}/sign-in",
            self.auth_base_url.trim_end_matches('/'),
            self.client_id
        )
    }
}

/// Endpoints of the third-party provider. Overridable so tests can point at
/// fixture servers.
#[derive(Clone)]
pub struct GitHubConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub user_api_url: String,
    pub scope: String,
}

impl GitHubConfig {
    pub fn from_env() -> Self {
        Self {
            authorize_url: env::var("GITHUB_AUTHORIZE_URL")
                .unwrap_or_else(|_| "https://github.com/login/oauth/authorize".to_string()),
            token_url: env::var("GITHUB_TOKEN_URL")
                .unwrap_or_else(|_| "https://github.com/login/oauth/access_token".to_string()),
            user_api_url: env::var("GITHUB_USER_API_URL")
                .unwrap_or_else(|_| "https://api.github.com/user".to_string()),
            scope: "read:user user:email".to_string(),
        }
    }
}

/// Holds the age identity used to seal session cookies.
#[derive(Clone)]
pub struct EncryptionConfig {
    pub key: Arc<Identity>,
}

impl EncryptionConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let key_str = env::var("SESSION_ENCRYPTION_KEY")
            .map_err(|_| eyre!("SESSION_ENCRYPTION_KEY environment variable not set"))?;

        let key = Identity::from_str(&key_str)
            .map_err(|e| eyre!("Failed to parse SESSION_ENCRYPTION_KEY: {}", e))?;

        Ok(Self { key: Arc::new(key) })
    }

    /// A throwaway identity. Sessions sealed under it do not survive a
    /// restart, which is exactly what tests and local development want.
    pub fn generate() -> Self {
        Self {
            key: Arc::new(Identity::generate()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: GateKeeperClient,
    pub config: GateKeeperConfig,
    pub github: GitHubConfig,
    pub encryption: EncryptionConfig,
    pub cookie_key: Key,
    pub http: reqwest::Client,
    pub protocol: String,
}

impl AppState {
    /// Assemble the state from explicit parts so flows are testable with
    /// injected fixtures.
    pub fn new(
        config: GateKeeperConfig,
        github: GitHubConfig,
        encryption: EncryptionConfig,
        cookie_key: Key,
        protocol: String,
    ) -> color_eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .timeout(OUTBOUND_TIMEOUT)
            .use_rustls_tls()
            .build()
            .wrap_err("Failed to build HTTP client")?;

        let gatekeeper = GateKeeperClient::new(http.clone(), config.api_base_url.clone());

        Ok(Self {
            gatekeeper,
            config,
            github,
            encryption,
            cookie_key,
            http,
            protocol,
        })
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        let config = GateKeeperConfig::from_env()?;
        let github = GitHubConfig::from_env();
        let encryption = EncryptionConfig::from_env()?;
        let cookie_key = cookie_key_from_env_or_generate()?;
        let protocol = env::var("PROTO").unwrap_or_else(|_| "https".to_string());

        Self::new(config, github, encryption, cookie_key, protocol)
    }

    /// Secure cookies everywhere except plain-http development setups.
    pub fn secure_cookies(&self) -> bool {
        self.protocol == "https"
    }
}

/// Derive the private-cookie key from `COOKIE_KEY` (base64, at least 32
/// bytes decoded), or generate an ephemeral one when unset.
pub fn cookie_key_from_env_or_generate() -> color_eyre::Result<Key> {
    match env::var("COOKIE_KEY") {
        Ok(encoded) => {
            let bytes =
                base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &encoded)
                    .wrap_err("COOKIE_KEY is not valid base64")?;
            if bytes.len() < 32 {
                return Err(eyre!("COOKIE_KEY must decode to at least 32 bytes"));
            }
            Ok(Key::derive_from(&bytes))
        }
        Err(_) => {
            tracing::warn!("COOKIE_KEY not set, generating an ephemeral cookie key");
            Ok(Key::generate())
        }
    }
}
