//! Keeps the access token valid across a long-running process.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use {
    secrecy::Secret,
    tracing::{debug, info, warn},
};

use {
    crate::{
        callback_server::CallbackServer,
        error::{Error, Result},
        flow::{AuthFlow, DEFAULT_CALLBACK_PORT, TokenGrant},
    },
    stashpost_config::{CredentialStore, CredentialsFile, set_rotation_cursor},
};

/// Fixed access-token validity window. DeviantArt tokens live one hour;
/// the endpoint's `expires_in` is deliberately not consulted.
const TOKEN_TTL_SECS: u64 = 3600;
/// Fixed wait between transport-level retry attempts.
const TRANSPORT_RETRY_WAIT: Duration = Duration::from_secs(5);
/// Transport failures tolerated per refresh before escalating.
const MAX_TRANSPORT_ATTEMPTS: u32 = 5;
/// How long the interactive flow waits for the browser redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

type BrowserLauncher = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Owns the access token and its validity window.
///
/// One instance per process; the credentials document is persisted
/// after every mutation (token refresh, rotation-cursor update).
pub struct TokenManager {
    flow: AuthFlow,
    store: CredentialStore,
    credentials: CredentialsFile,
    callback_port: u16,
    launcher: BrowserLauncher,
    token: Option<Secret<String>>,
    expires_at: Option<u64>,
}

impl TokenManager {
    #[must_use]
    pub fn new(flow: AuthFlow, store: CredentialStore, credentials: CredentialsFile) -> Self {
        Self {
            flow,
            store,
            credentials,
            callback_port: DEFAULT_CALLBACK_PORT,
            launcher: Box::new(|url| open::that(url).is_ok()),
            token: None,
            expires_at: None,
        }
    }

    /// Replace how the authorization URL reaches the user.
    #[must_use]
    pub fn with_browser_launcher(
        mut self,
        launcher: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    #[must_use]
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialsFile {
        &self.credentials
    }

    /// A valid access token, refreshing first if the cached one is
    /// absent or past its window.
    pub async fn get_token(&mut self) -> Result<Secret<String>> {
        let expired = match (&self.token, self.expires_at) {
            (Some(_), Some(expiry)) => now_secs() >= expiry,
            _ => true,
        };
        if expired {
            self.refresh().await?;
        }
        self.token
            .clone()
            .ok_or_else(|| Error::config("no access token after refresh"))
    }

    /// Fetch a fresh access token and persist the credentials.
    ///
    /// Uses the stored refresh token when one exists; otherwise runs
    /// the interactive authorization flow.
    pub async fn refresh(&mut self) -> Result<()> {
        let grant = self.fetch_grant_with_retry().await?;

        // Refresh tokens rotate; the newest value wins.
        if let Some(rotated) = grant.refresh_token {
            self.credentials.refresh_token = Some(rotated);
        }
        self.token = Some(grant.access_token);
        self.expires_at = Some(now_secs() + TOKEN_TTL_SECS);

        self.store.save(&self.credentials)?;
        debug!("access token refreshed");
        Ok(())
    }

    /// Advance the rotation cursor for a scheduled job and persist it.
    pub fn register_rotation_progress(&mut self, job_id: &str, index: usize) -> Result<()> {
        set_rotation_cursor(&mut self.credentials.extra, job_id, index)?;
        self.store.save(&self.credentials)?;
        debug!(job_id, index, "rotation cursor advanced");
        Ok(())
    }

    async fn fetch_grant_with_retry(&mut self) -> Result<TokenGrant> {
        let mut attempt = 1;
        loop {
            match self.fetch_grant().await {
                Err(Error::Transport { source }) if attempt < MAX_TRANSPORT_ATTEMPTS => {
                    warn!(
                        attempt,
                        max_attempts = MAX_TRANSPORT_ATTEMPTS,
                        error = %source,
                        "token endpoint unreachable, retrying"
                    );
                    tokio::time::sleep(TRANSPORT_RETRY_WAIT).await;
                    attempt += 1;
                },
                other => return other,
            }
        }
    }

    async fn fetch_grant(&mut self) -> Result<TokenGrant> {
        match self.credentials.refresh_token.clone() {
            Some(refresh) => self.flow.exchange_refresh(&refresh).await,
            None => self.authorize_interactive().await,
        }
    }

    async fn authorize_interactive(&mut self) -> Result<TokenGrant> {
        let request = self.flow.start()?;
        info!(port = self.callback_port, "waiting for interactive authorization");
        if !(self.launcher)(&request.url) {
            info!(url = %request.url, "could not open a browser; visit the URL manually");
        }
        let code =
            CallbackServer::wait_for_code(self.callback_port, request.state, CALLBACK_TIMEOUT)
                .await?;
        self.flow.exchange_code(&code).await
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {secrecy::ExposeSecret, tempfile::TempDir};

    use {super::*, crate::flow::AuthEndpoints};

    fn manager_for(server: &mockito::ServerGuard, dir: &TempDir, document: &str) -> TokenManager {
        let endpoints = AuthEndpoints {
            auth_url: format!("{}/authorize", server.url()),
            token_url: format!("{}/token", server.url()),
            redirect_uri: "http://localhost:6414/callback".into(),
        };
        let store = CredentialStore::new(dir.path().join("stashpost.json"));
        let credentials: CredentialsFile = serde_json::from_str(document).unwrap();
        let flow = AuthFlow::new(
            endpoints,
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
        );
        TokenManager::new(flow, store, credentials)
    }

    const WITH_REFRESH: &str =
        r#"{"client_id": "1", "client_secret": "s", "refresh_token": "rt-old"}"#;

    #[tokio::test]
    async fn cached_token_is_reused_without_a_second_network_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "at-1", "refresh_token": "rt-new"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager_for(&server, &dir, WITH_REFRESH);

        let first = manager.get_token().await.unwrap();
        let second = manager.get_token().await.unwrap();
        assert_eq!(first.expose_secret(), second.expose_secret());
        assert_eq!(first.expose_secret(), "at-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_triggers_a_refresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "at-2"}"#)
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager_for(&server, &dir, WITH_REFRESH);

        manager.get_token().await.unwrap();
        manager.expires_at = Some(now_secs()); // force the window shut
        manager.get_token().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_persisted() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "at-1", "refresh_token": "rt-new"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager_for(&server, &dir, WITH_REFRESH);
        manager.refresh().await.unwrap();

        assert_eq!(
            manager
                .credentials()
                .refresh_token
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
            Some("rt-new")
        );
        // And the document on disk agrees.
        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("stashpost.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["refresh_token"], "rt-new");
        // The raw access token never lands on disk.
        assert!(saved.get("access_token").is_none());
    }

    #[tokio::test]
    async fn refresh_without_rotation_keeps_the_old_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "at-1"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager_for(&server, &dir, WITH_REFRESH);
        manager.refresh().await.unwrap();

        assert_eq!(
            manager
                .credentials()
                .refresh_token
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
            Some("rt-old")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = AuthEndpoints {
            auth_url: "http://127.0.0.1:1/authorize".into(),
            token_url: "http://127.0.0.1:1/token".into(),
            redirect_uri: "http://localhost:6414/callback".into(),
        };
        let store = CredentialStore::new(dir.path().join("stashpost.json"));
        let credentials: CredentialsFile = serde_json::from_str(WITH_REFRESH).unwrap();
        let flow = AuthFlow::new(endpoints, "1".into(), Secret::new("s".into()));
        let mut manager = TokenManager::new(flow, store, credentials);

        let err = manager.refresh().await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn rotation_progress_requires_a_rotation_job() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let document = r#"{
            "client_id": "1",
            "client_secret": "s",
            "refresh_token": "rt",
            "post_config": {
                "cycle": {
                    "type": "rotation",
                    "directories": ["/a", "/b"],
                    "tags": [[], []],
                    "last_posted": 0,
                    "images_per_day": 1,
                    "time": "10:00",
                    "galleries": []
                }
            }
        }"#;
        let mut manager = manager_for(&server, &dir, document);

        manager.register_rotation_progress("cycle", 1).unwrap();
        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("stashpost.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["post_config"]["cycle"]["last_posted"], 1);

        let err = manager.register_rotation_progress("nope", 0).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
