//! The on-disk credentials document and its store.
//!
//! One JSON file holds the application identity, the refresh token and
//! everything else the operator keeps next to them (posting jobs, debug
//! flags). Keys this crate does not recognise ride along in [`CredentialsFile::extra`]
//! and survive every save untouched.

use std::path::{Path, PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Deserializer, Serialize},
    tracing::{debug, info},
};

use crate::error::Result;

/// DeviantArt application credentials plus pass-through configuration.
///
/// The access token itself is never part of this document; only the
/// material needed to re-derive one is persisted.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialsFile {
    #[serde(deserialize_with = "string_or_number")]
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: Secret<String>,
    /// Absent until the first interactive authorization completes.
    #[serde(default, serialize_with = "serialize_option_secret")]
    pub refresh_token: Option<Secret<String>>,
    /// Every key the credential subsystem does not own.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for CredentialsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsFile")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialsFile {
    /// Read a boolean flag from the extra keys.
    ///
    /// Accepts a JSON bool or the string forms `"true"`/`"True"` the
    /// original hand-written configs used.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.extra.get(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => match s.as_str() {
                "true" | "True" => Some(true),
                "false" | "False" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// File-based credentials storage.
///
/// Every save rewrites the whole document; last writer wins.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<CredentialsFile> {
        let data = std::fs::read_to_string(&self.path)?;
        let file = serde_json::from_str(&data)?;
        debug!(path = %self.path.display(), "credentials loaded");
        Ok(file)
    }

    pub fn save(&self, credentials: &CredentialsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, &data)?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %self.path.display(), "credentials saved");
        Ok(())
    }
}

/// Accept a string or a bare number; hand-written configs store the
/// numeric client id unquoted.
fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

/// Serialize a `Secret<String>` by exposing its inner value.
/// Use only for fields that must round-trip through storage.
pub fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Serialize an `Option<Secret<String>>` by exposing its inner value.
pub fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
