use std::path::Path;

use anyhow::Result;

use {
    stashpost_config::CredentialStore,
    stashpost_oauth::{AuthEndpoints, AuthFlow, TokenManager},
};

/// Run the interactive authorization flow and persist the grant.
pub async fn login(config_path: &Path) -> Result<()> {
    let store = CredentialStore::new(config_path.to_path_buf());
    let mut credentials = store.load()?;
    // Force a fresh interactive grant even if a refresh token exists.
    credentials.refresh_token = None;

    let flow = AuthFlow::new(
        AuthEndpoints::default(),
        credentials.client_id.clone(),
        credentials.client_secret.clone(),
    );
    let mut manager = TokenManager::new(flow, store, credentials);

    println!("Opening browser for authorization...");
    manager.refresh().await?;

    println!("Authorization complete; credentials saved.");
    Ok(())
}

/// Show what the credentials document holds.
pub fn status(config_path: &Path) -> Result<()> {
    let store = CredentialStore::new(config_path.to_path_buf());
    if !store.exists() {
        println!("No credentials document at {}", config_path.display());
        println!("Create one with your client_id and client_secret, then run `stashpost login`.");
        return Ok(());
    }

    let credentials = store.load()?;
    println!("Credentials document: {}", config_path.display());
    println!("  client_id:     {}", credentials.client_id);
    println!(
        "  refresh token: {}",
        if credentials.refresh_token.is_some() {
            "present"
        } else {
            "absent (run `stashpost login`)"
        }
    );
    Ok(())
}
