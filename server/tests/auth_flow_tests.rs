use std::collections::HashMap;
use std::net::SocketAddr;

use reqwest::header::SET_COOKIE;
use reqwest::{redirect, StatusCode};

use gk_dashboard::routes;
use gk_dashboard::state::{
    cookie_key_from_env_or_generate, AppState, EncryptionConfig, GateKeeperConfig, GitHubConfig,
};

async fn spawn(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Boot the app against in-process fixture servers and return its base URL.
async fn spawn_app() -> String {
    let gatekeeper_addr = spawn(fixtures::gatekeeper::router()).await;
    let github_addr = spawn(fixtures::github::router()).await;

    let config = GateKeeperConfig {
        api_base_url: format!("http://{gatekeeper_addr}"),
        auth_base_url: format!("http://{gatekeeper_addr}"),
        client_id: "test-application".to_string(),
        client_secret: "test-application-secret".to_string(),
    };
    let github = GitHubConfig {
        authorize_url: format!("http://{github_addr}/login/oauth/authorize"),
        token_url: format!("http://{github_addr}/login/oauth/access_token"),
        user_api_url: format!("http://{github_addr}/user"),
        scope: "read:user user:email".to_string(),
    };

    let state = AppState::new(
        config,
        github,
        EncryptionConfig::generate(),
        cookie_key_from_env_or_generate().unwrap(),
        "http".to_string(),
    )
    .unwrap();

    let app_addr = spawn(routes::routes(state)).await;
    format!("http://{app_addr}")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

fn set_cookie_names(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split('=').next())
        .map(|name| name.to_string())
        .collect()
}

fn query_params(url: &str) -> HashMap<String, String> {
    let (_, query) = url.split_once('?').expect("url has a query string");
    serde_urlencoded::from_str(query).unwrap()
}

/// Drive the initiation leg and hand back the round-tripped parameters.
async fn begin_first_party(client: &reqwest::Client, base: &str) -> HashMap<String, String> {
    let response = client
        .post(format!("{base}/api/auth/login"))
        .json(&serde_json::json!({ "redirectUri": "/app" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookie_names(&response);
    assert!(cookies.iter().any(|name| name == "gk_state"));
    assert!(cookies.iter().any(|name| name == "gk_code_verifier"));

    let body: serde_json::Value = response.json().await.unwrap();
    query_params(body["url"].as_str().unwrap())
}

#[tokio::test]
async fn first_party_initiation_builds_a_pkce_authorization_url() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;

    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["redirect_uri"], "/app");
    assert!(!params["state"].is_empty());
    assert!(!params["code_challenge"].is_empty());
}

#[tokio::test]
async fn first_party_flow_establishes_a_session() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;

    let response = client
        .get(format!("{base}/api/auth/callback"))
        .query(&[
            ("code", fixtures::gatekeeper::VALID_AUTHORIZATION_CODE),
            ("state", params["state"].as_str()),
            ("redirect_uri", "/app"),
            ("code_challenge", params["code_challenge"].as_str()),
        ])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()["location"], "/app");

    let cookies = set_cookie_names(&response);
    assert!(cookies.iter().any(|name| name == "gk_session"));

    // The dashboard shell can now introspect the session
    let me = client
        .get(format!("{base}/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let body: serde_json::Value = me.json().await.unwrap();
    assert_eq!(body["userId"], fixtures::gatekeeper::USER_ID);
    assert_eq!(body["identitySource"], "gatekeeper");
    // Tokens stay inside the sealed cookie
    assert!(body.get("accessToken").is_none());
}

#[tokio::test]
async fn first_party_callback_rejects_a_mismatched_state() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;

    let response = client
        .get(format!("{base}/api/auth/callback"))
        .query(&[
            ("code", fixtures::gatekeeper::VALID_AUTHORIZATION_CODE),
            ("state", "attacker-chosen"),
            ("redirect_uri", "/app"),
            ("code_challenge", params["code_challenge"].as_str()),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Invalid State");
}

#[tokio::test]
async fn first_party_callback_rejects_a_foreign_code_challenge() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;

    let response = client
        .get(format!("{base}/api/auth/callback"))
        .query(&[
            ("code", fixtures::gatekeeper::VALID_AUTHORIZATION_CODE),
            ("state", params["state"].as_str()),
            ("redirect_uri", "/app"),
            ("code_challenge", "not-derived-from-the-stored-verifier"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap(), "Invalid Code Challenge");
}

#[tokio::test]
async fn first_party_callback_rejects_a_bad_authorization_code() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;

    let response = client
        .get(format!("{base}/api/auth/callback"))
        .query(&[
            ("code", "some-other-code"),
            ("state", params["state"].as_str()),
            ("redirect_uri", "/app"),
            ("code_challenge", params["code_challenge"].as_str()),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let cookies = set_cookie_names(&response);
    assert_eq!(response.text().await.unwrap(), "Invalid Code");

    assert!(!cookies.iter().any(|name| name == "gk_session"));
}

#[tokio::test]
async fn a_processed_callback_cannot_be_replayed() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;

    let callback = |client: &reqwest::Client| {
        client
            .get(format!("{base}/api/auth/callback"))
            .query(&[
                ("code", fixtures::gatekeeper::VALID_AUTHORIZATION_CODE),
                ("state", params["state"].as_str()),
                ("redirect_uri", "/app"),
                ("code_challenge", params["code_challenge"].as_str()),
            ])
            .send()
    };

    let first = callback(&client).await.unwrap();
    assert!(first.status().is_redirection());

    // The transient secrets were consumed by the first attempt
    let replay = callback(&client).await.unwrap();
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    let cookies = set_cookie_names(&replay);
    assert!(!cookies.iter().any(|name| name == "gk_session"));
}

#[tokio::test]
async fn third_party_flow_establishes_a_session() {
    let base = spawn_app().await;
    let client = client();

    let response = client
        .post(format!("{base}/api/auth/external-login"))
        .json(&serde_json::json!({ "oauthProviderId": fixtures::gatekeeper::PROVIDER_ID }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookie_names(&response);
    assert!(cookies.iter().any(|name| name == "oauth_state"));
    assert!(cookies.iter().any(|name| name == "oauth_provider_id"));

    let body: serde_json::Value = response.json().await.unwrap();
    let params = query_params(body["url"].as_str().unwrap());
    assert_eq!(params["client_id"], fixtures::gatekeeper::PROVIDER_CLIENT_ID);
    assert_eq!(params["scope"], "read:user user:email");

    let callback = client
        .get(format!("{base}/api/auth/external-login/callback"))
        .query(&[
            ("code", fixtures::github::VALID_PROVIDER_CODE),
            ("state", params["state"].as_str()),
        ])
        .send()
        .await
        .unwrap();

    assert!(callback.status().is_redirection());
    assert_eq!(callback.headers()["location"], "/dashboard");
    let cookies = set_cookie_names(&callback);
    assert!(cookies.iter().any(|name| name == "gk_session"));

    let me = client
        .get(format!("{base}/api/auth/me"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = me.json().await.unwrap();
    assert_eq!(body["userId"], fixtures::github::USER_ID.to_string());
    assert_eq!(body["identitySource"], "github");
}

#[tokio::test]
async fn third_party_initiation_fails_closed_when_credentials_cannot_be_resolved() {
    let base = spawn_app().await;
    let client = client();

    let response = client
        .post(format!("{base}/api/auth/external-login"))
        .json(&serde_json::json!({ "oauthProviderId": "00000000-0000-0000-0000-000000000000" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie_names(&response).is_empty());
}

#[tokio::test]
async fn third_party_callback_redirects_on_state_mismatch() {
    let base = spawn_app().await;
    let client = client();

    let response = client
        .post(format!("{base}/api/auth/external-login"))
        .json(&serde_json::json!({ "oauthProviderId": fixtures::gatekeeper::PROVIDER_ID }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let callback = client
        .get(format!("{base}/api/auth/external-login/callback"))
        .query(&[
            ("code", fixtures::github::VALID_PROVIDER_CODE),
            ("state", "attacker-chosen"),
        ])
        .send()
        .await
        .unwrap();

    assert!(callback.status().is_redirection());
    assert_eq!(callback.headers()["location"], "/login?error=invalid_state");
    let cookies = set_cookie_names(&callback);
    assert!(!cookies.iter().any(|name| name == "gk_session"));
}

#[tokio::test]
async fn third_party_callback_redirects_when_the_code_is_missing() {
    let base = spawn_app().await;
    let client = client();

    let response = client
        .post(format!("{base}/api/auth/external-login"))
        .json(&serde_json::json!({ "oauthProviderId": fixtures::gatekeeper::PROVIDER_ID }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let params = query_params(body["url"].as_str().unwrap());

    let callback = client
        .get(format!("{base}/api/auth/external-login/callback"))
        .query(&[("state", params["state"].as_str())])
        .send()
        .await
        .unwrap();

    assert!(callback.status().is_redirection());
    assert_eq!(callback.headers()["location"], "/login?error=no_code");
}

#[tokio::test]
async fn third_party_callback_without_any_stored_flow_is_rejected() {
    let base = spawn_app().await;
    let client = client();

    let callback = client
        .get(format!("{base}/api/auth/external-login/callback"))
        .query(&[
            ("code", fixtures::github::VALID_PROVIDER_CODE),
            ("state", "anything"),
        ])
        .send()
        .await
        .unwrap();

    assert!(callback.status().is_redirection());
    assert_eq!(callback.headers()["location"], "/login?error=invalid_state");
}

#[tokio::test]
async fn logout_clears_the_session() {
    let base = spawn_app().await;
    let client = client();

    let params = begin_first_party(&client, &base).await;
    let response = client
        .get(format!("{base}/api/auth/callback"))
        .query(&[
            ("code", fixtures::gatekeeper::VALID_AUTHORIZATION_CODE),
            ("state", params["state"].as_str()),
            ("redirect_uri", "/app"),
            ("code_challenge", params["code_challenge"].as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let logout = client.get(format!("{base}/logout")).send().await.unwrap();
    assert!(logout.status().is_redirection());
    assert_eq!(logout.headers()["location"], "/login");

    let me = client
        .get(format!("{base}/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}
