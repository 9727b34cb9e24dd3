use {
    rand::{Rng, distr::Alphanumeric},
    secrecy::{ExposeSecret, Secret},
    url::Url,
};

use crate::error::{Error, Result};

/// Port the local callback listener binds to.
pub const DEFAULT_CALLBACK_PORT: u16 = 6414;
/// Redirect path the authorization server sends the browser back to.
pub const CALLBACK_PATH: &str = "/callback";

const SCOPE: &str = "basic";
/// Length of the anti-forgery `state` nonce.
const STATE_LEN: usize = 30;

/// DeviantArt OAuth2 endpoints.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://www.deviantart.com/oauth2/authorize".into(),
            token_url: "https://www.deviantart.com/oauth2/token".into(),
            redirect_uri: format!("http://localhost:{DEFAULT_CALLBACK_PORT}{CALLBACK_PATH}"),
        }
    }
}

/// Manages the OAuth 2.0 authorization-code and refresh-token exchanges.
///
/// The client authenticates via HTTP Basic auth built from its id and
/// secret; the anti-forgery nonce protects the redirect leg.
pub struct AuthFlow {
    endpoints: AuthEndpoints,
    client_id: String,
    client_secret: Secret<String>,
    client: reqwest::Client,
}

/// Result of starting the authorization flow.
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Tokens returned by the token endpoint.
///
/// `refresh_token` is present whenever the endpoint rotated it; the
/// caller must persist the newest value.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
}

/// Generate the anti-forgery `state` nonce: unpredictable alphanumeric,
/// 30 characters.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

impl AuthFlow {
    #[must_use]
    pub fn new(endpoints: AuthEndpoints, client_id: String, client_secret: Secret<String>) -> Self {
        Self {
            endpoints,
            client_id,
            client_secret,
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    /// Build the authorization URL and generate a fresh nonce.
    ///
    /// Each invocation owns its own nonce; re-running the flow after a
    /// failure starts over with a new one.
    pub fn start(&self) -> Result<AuthorizationRequest> {
        let state = generate_state();

        let mut url = Url::parse(&self.endpoints.auth_url)
            .map_err(|source| Error::config(format!("invalid auth_url: {source}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.endpoints.redirect_uri)
            .append_pair("scope", SCOPE)
            .append_pair("state", &state);

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.endpoints.redirect_uri.as_str()),
        ];
        self.token_request(&form).await
    }

    /// Mint a new access token from a stored refresh token.
    pub async fn exchange_refresh(&self, refresh_token: &Secret<String>) -> Result<TokenGrant> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret().as_str()),
        ];
        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(form)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::transport)?;

        if status.is_client_error() || status.is_server_error() {
            return Err(Error::auth(status.as_u16(), body));
        }

        let json: serde_json::Value = serde_json::from_str(&body)?;
        // The endpoint reports failures in-band even under a 200.
        if let Some(error) = json.get("error") {
            let description = json
                .get("error_description")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(Error::auth(status.as_u16(), description));
        }

        parse_token_grant(&json, status.as_u16())
    }
}

fn parse_token_grant(json: &serde_json::Value, status: u16) -> Result<TokenGrant> {
    let access_token = json["access_token"]
        .as_str()
        .ok_or_else(|| Error::auth(status, "token response missing access_token"))?
        .to_string();
    let refresh_token = json["refresh_token"].as_str().map(str::to_string);

    Ok(TokenGrant {
        access_token: Secret::new(access_token),
        refresh_token: refresh_token.map(Secret::new),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn flow_for(server: &mockito::ServerGuard) -> AuthFlow {
        let endpoints = AuthEndpoints {
            auth_url: format!("{}/authorize", server.url()),
            token_url: format!("{}/token", server.url()),
            redirect_uri: "http://localhost:6414/callback".into(),
        };
        AuthFlow::new(endpoints, "1234".into(), Secret::new("s3cret".into()))
    }

    #[test]
    fn state_is_alphanumeric_and_long_enough() {
        let state = generate_state();
        assert_eq!(state.len(), 30);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn each_start_owns_a_fresh_nonce() {
        let endpoints = AuthEndpoints::default();
        let flow = AuthFlow::new(endpoints, "1234".into(), Secret::new("s".into()));
        let first = flow.start().unwrap();
        let second = flow.start().unwrap();
        assert_ne!(first.state, second.state);
    }

    #[test]
    fn start_builds_the_authorization_url() {
        let endpoints = AuthEndpoints::default();
        let flow = AuthFlow::new(endpoints, "1234".into(), Secret::new("s".into()));
        let request = flow.start().unwrap();

        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.host_str(), Some("www.deviantart.com"));
        assert_eq!(url.path(), "/oauth2/authorize");

        let params: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("response_type").map(|v| v.as_ref()), Some("code"));
        assert_eq!(params.get("client_id").map(|v| v.as_ref()), Some("1234"));
        assert_eq!(params.get("scope").map(|v| v.as_ref()), Some("basic"));
        assert_eq!(
            params.get("redirect_uri").map(|v| v.as_ref()),
            Some("http://localhost:6414/callback")
        );
        assert_eq!(params.get("state").map(|v| v.len()), Some(30));
    }

    #[tokio::test]
    async fn exchange_code_returns_both_tokens() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_header("authorization", mockito::Matcher::Regex("Basic .+".into()))
            .with_status(200)
            .with_body(r#"{"access_token": "at-1", "refresh_token": "rt-1"}"#)
            .create_async()
            .await;

        let grant = flow_for(&server).exchange_code("the-code").await.unwrap();
        assert_eq!(grant.access_token.expose_secret(), "at-1");
        assert_eq!(
            grant.refresh_token.as_ref().map(|s| s.expose_secret().as_str()),
            Some("rt-1")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exchange_refresh_without_rotation_leaves_refresh_absent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token": "at-2"}"#)
            .create_async()
            .await;

        let grant = flow_for(&server)
            .exchange_refresh(&Secret::new("rt-old".into()))
            .await
            .unwrap();
        assert_eq!(grant.access_token.expose_secret(), "at-2");
        assert!(grant.refresh_token.is_none());
    }

    #[tokio::test]
    async fn error_status_surfaces_the_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(401)
            .with_body("bad client")
            .create_async()
            .await;

        let err = flow_for(&server).exchange_code("x").await.unwrap_err();
        match err {
            Error::Auth {
                status,
                description,
            } => {
                assert_eq!(status, 401);
                assert!(description.contains("bad client"));
            },
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_band_error_field_fails_even_under_200() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(
                r#"{"error": "invalid_grant", "error_description": "code already used"}"#,
            )
            .create_async()
            .await;

        let err = flow_for(&server).exchange_code("x").await.unwrap_err();
        match err {
            Error::Auth { description, .. } => assert_eq!(description, "code already used"),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let endpoints = AuthEndpoints {
            auth_url: "http://127.0.0.1:1/authorize".into(),
            token_url: "http://127.0.0.1:1/token".into(),
            redirect_uri: "http://localhost:6414/callback".into(),
        };
        let flow = AuthFlow::new(endpoints, "1234".into(), Secret::new("s".into()));
        let err = flow.exchange_code("x").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
