use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    axum::{Router, extract::Query, response::Html, routing::get},
    tokio::sync::oneshot,
};

use crate::{
    error::{Error, Result},
    flow::CALLBACK_PATH,
};

const CONFIRMATION_PAGE: &str =
    "<h1>Authorization received.</h1><p>You can close this window and return to stashpost.</p>";

/// One-shot local HTTP listener that captures the authorization redirect.
pub struct CallbackServer;

impl CallbackServer {
    /// Listen on `127.0.0.1:{port}` for a single GET on the redirect
    /// path carrying `code` and `state`, validate `state` against
    /// `expected_state`, and return the authorization code.
    ///
    /// The socket is released on every exit path (success, state
    /// mismatch, or timeout), so a failed flow can simply be re-run
    /// with a fresh nonce and a fresh listener.
    pub async fn wait_for_code(
        port: u16,
        expected_state: String,
        timeout: Duration,
    ) -> Result<String> {
        let (tx, rx) = oneshot::channel::<Result<String>>();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let app = Router::new().route(
            CALLBACK_PATH,
            get(move |Query(params): Query<HashMap<String, String>>| {
                let tx = tx.lock().unwrap_or_else(|e| e.into_inner()).take();
                let expected_state = expected_state.clone();
                async move {
                    let result = extract_code(&params, &expected_state);
                    let page = match &result {
                        Ok(_) => Html(CONFIRMATION_PAGE.to_string()),
                        Err(e) => Html(format!("<h1>Authorization failed</h1><p>{e}</p>")),
                    };
                    if let Some(tx) = tx {
                        let _ = tx.send(result);
                    }
                    page
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let server = axum::serve(listener, app);

        tokio::select! {
            result = rx => {
                result.unwrap_or_else(|_| Err(Error::config("callback channel closed")))
            }
            _ = server.into_future() => {
                Err(Error::config("callback server exited unexpectedly"))
            }
            () = tokio::time::sleep(timeout) => {
                Err(Error::CallbackTimeout { seconds: timeout.as_secs() })
            }
        }
    }
}

fn extract_code(params: &HashMap<String, String>, expected_state: &str) -> Result<String> {
    let state = params
        .get("state")
        .ok_or(Error::MissingParam { param: "state" })?;
    if state != expected_state {
        return Err(Error::state_mismatch(expected_state, state));
    }
    params
        .get("code")
        .cloned()
        .ok_or(Error::MissingParam { param: "code" })
}
