#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::time::Duration;

use {
    secrecy::ExposeSecret,
    stashpost_config::{CredentialStore, CredentialsFile},
    stashpost_oauth::{AuthEndpoints, AuthFlow, CallbackServer, Error, TokenManager},
};

fn state_of(auth_url: &str) -> String {
    let url = url::Url::parse(auth_url).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

/// Full first-time authorization: browser hook, callback capture, code
/// exchange, credential persistence.
#[tokio::test]
async fn interactive_authorization_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token": "at-live", "refresh_token": "rt-live"}"#)
        .create_async()
        .await;

    let port = 46321;
    let endpoints = AuthEndpoints {
        auth_url: format!("{}/authorize", server.url()),
        token_url: format!("{}/token", server.url()),
        redirect_uri: format!("http://localhost:{port}/callback"),
    };

    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("stashpost.json"));
    let credentials: CredentialsFile =
        serde_json::from_str(r#"{"client_id": "1234", "client_secret": "s3cret"}"#).unwrap();
    let flow = AuthFlow::new(
        endpoints,
        credentials.client_id.clone(),
        credentials.client_secret.clone(),
    );

    // Stand in for the browser: follow the redirect ourselves.
    let launcher = move |auth_url: &str| {
        let state = state_of(auth_url);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = reqwest::get(format!(
                "http://127.0.0.1:{port}/callback?code=auth-code&state={state}"
            ))
            .await;
        });
        true
    };

    let mut manager = TokenManager::new(flow, store, credentials)
        .with_callback_port(port)
        .with_browser_launcher(launcher);

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.expose_secret(), "at-live");
    token_mock.assert_async().await;

    let saved: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("stashpost.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved["refresh_token"], "rt-live");
}

/// A forged redirect must abort the flow without yielding a code.
#[tokio::test]
async fn forged_state_aborts_the_flow() {
    let port = 46322;
    let wait = tokio::spawn(CallbackServer::wait_for_code(
        port,
        "genuine-state".into(),
        Duration::from_secs(5),
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    reqwest::get(format!(
        "http://127.0.0.1:{port}/callback?code=stolen&state=forged"
    ))
    .await
    .unwrap();

    let err = wait.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::StateMismatch { .. }));
}
