//! Command implementations.
//!
//! Each command writes human-readable output to `out`. Token values are
//! never printed.

use std::io::Write;

use anyhow::{Context, Result};
use credmgr_core::{Credential, CredentialManager, OAuth2Credential, OAuth2Filter};

/// Arguments for adding an OAuth2 credential.
#[derive(Debug, Default)]
pub struct NewCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub scopes: Vec<String>,
}

/// Split a comma-separated scope list, dropping empty entries.
pub fn parse_scopes(scopes: Option<&str>) -> Vec<String> {
    scopes
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn list_providers(manager: &CredentialManager, out: &mut impl Write) -> Result<()> {
    let mut providers = manager.identity_providers();
    providers.sort_by_key(|p| p.provider_name().to_lowercase());

    if providers.is_empty() {
        writeln!(out, "No identity providers configured")?;
        return Ok(());
    }

    writeln!(out, "Identity providers:")?;
    for provider in providers {
        writeln!(
            out,
            "  {} [{}]",
            provider.provider_name(),
            provider.provider_type()
        )?;
    }
    Ok(())
}

pub async fn list_credentials(
    manager: &CredentialManager,
    provider: Option<&str>,
    user_id: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let credentials: Vec<Credential> = manager
        .credentials()
        .await
        .into_iter()
        .filter(|c| c.matches_identity(provider, user_id))
        .collect();

    write_credentials(&credentials, out)
}

pub async fn find_credentials(
    manager: &CredentialManager,
    filter: &OAuth2Filter,
    out: &mut impl Write,
) -> Result<()> {
    let credentials: Vec<Credential> = manager
        .credentials()
        .await
        .into_iter()
        .filter(|c| c.as_oauth2().is_some_and(|oauth| filter.matches(oauth)))
        .collect();

    write_credentials(&credentials, out)
}

pub async fn whois(manager: &CredentialManager, user_id: &str, out: &mut impl Write) -> Result<()> {
    match manager.get_oauth2_credential_by_user_id(user_id).await {
        Some(credential) => write_oauth2(&credential, out),
        None => {
            writeln!(out, "No OAuth2 credential for user {}", user_id)?;
            Ok(())
        }
    }
}

pub async fn add_credential(
    manager: &CredentialManager,
    provider: &str,
    new: NewCredential,
    out: &mut impl Write,
) -> Result<()> {
    let mut credential = OAuth2Credential::new(provider, new.access_token)
        .context("Invalid credential")?
        .with_scopes(new.scopes);
    if let Some(refresh_token) = new.refresh_token {
        credential = credential.with_refresh_token(refresh_token);
    }
    if let Some(user_id) = new.user_id {
        credential = credential.with_user_id(user_id);
    }
    if let Some(user_name) = new.user_name {
        credential = credential.with_user_name(user_name);
    }

    manager
        .add_credential(provider, credential.into())
        .await
        .with_context(|| format!("Failed to add credential for {}", provider))?;
    manager.save().await.context("Failed to save credentials")?;

    tracing::info!("Added credential for {}", provider);
    writeln!(out, "Added credential for {}", provider)?;
    Ok(())
}

fn write_credentials(credentials: &[Credential], out: &mut impl Write) -> Result<()> {
    if credentials.is_empty() {
        writeln!(out, "No credentials found")?;
        return Ok(());
    }

    for credential in credentials {
        match credential {
            Credential::OAuth2(oauth) => write_oauth2(oauth, out)?,
            Credential::Generic(generic) => writeln!(
                out,
                "{}\tgeneric\tuser={}\tfields={}",
                generic.identity_provider,
                generic.user_id.as_deref().unwrap_or("-"),
                generic.fields.len()
            )?,
        }
    }
    Ok(())
}

fn write_oauth2(credential: &OAuth2Credential, out: &mut impl Write) -> Result<()> {
    let scopes: Vec<&str> = credential.scopes.iter().map(String::as_str).collect();
    writeln!(
        out,
        "{}\toauth2\tuser={}\tname={}\tscopes={}",
        credential.identity_provider,
        credential.user_id.as_deref().unwrap_or("-"),
        credential.user_name.as_deref().unwrap_or("-"),
        scopes.join(",")
    )?;
    Ok(())
}
