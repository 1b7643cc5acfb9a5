//! Key Vault backed [`SecretResolver`] using the ambient managed identity.
//!
//! Tokens come from the App Service / Functions identity endpoint when
//! `IDENTITY_ENDPOINT` and `IDENTITY_HEADER` are set, otherwise from the
//! instance metadata service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::present;
use crate::contract::SecretResolver;
use crate::error::SecretError;

pub const IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
pub const IDENTITY_HEADER: &str = "IDENTITY_HEADER";

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const VAULT_RESOURCE: &str = "https://vault.azure.net";
const KEY_VAULT_API_VERSION: &str = "7.4";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

/// Token source for the identity the process runs as.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: Url,
    identity_header: Option<String>,
}

impl ManagedIdentityCredential {
    /// Picks the hosting identity endpoint if the host advertises one.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, SecretError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match (
            present(lookup, IDENTITY_ENDPOINT),
            present(lookup, IDENTITY_HEADER),
        ) {
            (Some(endpoint), Some(header)) => {
                debug!(endpoint = %endpoint, "Using hosting identity endpoint");
                Self::new(&endpoint, Some(header))
            }
            _ => {
                debug!("Using instance metadata identity endpoint");
                Self::new(IMDS_ENDPOINT, None)
            }
        }
    }

    pub fn new(endpoint: &str, identity_header: Option<String>) -> Result<Self, SecretError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SecretError::Identity(format!("invalid identity endpoint {endpoint}: {e}")))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            identity_header,
        })
    }

    /// Bearer token for `resource`.
    pub async fn token(&self, resource: &str) -> Result<String, SecretError> {
        let request = match &self.identity_header {
            Some(header) => self
                .client
                .get(self.endpoint.clone())
                .query(&[("resource", resource), ("api-version", "2019-08-01")])
                .header("X-IDENTITY-HEADER", header),
            None => self
                .client
                .get(self.endpoint.clone())
                .query(&[("resource", resource), ("api-version", "2018-02-01")])
                .header("Metadata", "true"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| SecretError::Identity(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Identity(format!(
                "identity endpoint returned {status}: {body}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SecretError::Identity(format!("malformed token response: {e}")))?;
        Ok(token.access_token)
    }
}

/// Reads secrets from one Key Vault.
pub struct KeyVaultClient {
    client: Client,
    vault_url: Url,
    credential: ManagedIdentityCredential,
    token: OnceCell<String>,
}

impl KeyVaultClient {
    pub fn new(vault_url: &str, credential: ManagedIdentityCredential) -> Result<Self, SecretError> {
        let vault_url =
            Url::parse(vault_url).map_err(|_| SecretError::InvalidVaultUrl(vault_url.to_string()))?;
        if vault_url.cannot_be_a_base() {
            return Err(SecretError::InvalidVaultUrl(vault_url.to_string()));
        }
        info!(vault_url = %vault_url, "Initialized KeyVaultClient");
        Ok(Self {
            client: Client::new(),
            vault_url,
            credential,
            token: OnceCell::new(),
        })
    }

    fn secret_url(&self, name: &str) -> Result<Url, SecretError> {
        let mut url = self.vault_url.clone();
        url.path_segments_mut()
            .map_err(|_| SecretError::InvalidVaultUrl(self.vault_url.to_string()))?
            .pop_if_empty()
            .push("secrets")
            .push(name);
        url.query_pairs_mut()
            .append_pair("api-version", KEY_VAULT_API_VERSION);
        Ok(url)
    }
}

#[async_trait]
impl SecretResolver for KeyVaultClient {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let token = self
            .token
            .get_or_try_init(|| self.credential.token(VAULT_RESOURCE))
            .await?;

        let url = self.secret_url(name)?;
        debug!(secret = name, "Fetching secret from key vault");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| SecretError::Request {
                name: name.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {
                let bundle: SecretBundle =
                    response.json().await.map_err(|source| SecretError::Request {
                        name: name.to_string(),
                        source,
                    })?;
                Ok(bundle.value)
            }
            StatusCode::NOT_FOUND => {
                error!(secret = name, "Secret not found in key vault");
                Err(SecretError::NotFound(name.to_string()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(secret = name, status = status.as_u16(), "Key vault request rejected");
                Err(SecretError::Status {
                    name: name.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
