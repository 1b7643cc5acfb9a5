#![doc = "Azure Blob Storage implementation of the blob sink, configured from a storage connection string."]
//
//! # Blob upload
//!
//! [`AzureBlobClient`] implements [`BlobSink`] with a single Put Blob call per
//! object. Authentication follows the connection string:
//! - `AccountKey` → Shared Key (`Authorization: SharedKey <account>:<sig>`)
//! - `SharedAccessSignature` → SAS query appended to the blob URL
//!
//! Supported connection string shapes:
//! - `DefaultEndpointsProtocol=https;AccountName=..;AccountKey=..;EndpointSuffix=core.windows.net`
//! - `BlobEndpoint=https://..;SharedAccessSignature=..` (or with `AccountName`/`AccountKey`)
//! - `UseDevelopmentStorage=true` for the local storage emulator

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use sha2::Sha256;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::contract::BlobSink;
use crate::error::{ConfigError, UploadError};

pub const STORAGE_API_VERSION: &str = "2021-08-06";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// How requests to the storage account are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredential {
    SharedKey { account: String, key: Vec<u8> },
    Sas(String),
}

impl fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageCredential::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            StorageCredential::Sas(_) => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// Parsed storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    pub blob_endpoint: Url,
    pub credential: StorageCredential,
}

impl StorageAccount {
    pub fn from_connection_string(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidConnectionString(reason.to_string());

        let mut fields: HashMap<String, String> = HashMap::new();
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| invalid("expected key=value segments"))?;
            fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if fields
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            let key = BASE64
                .decode(DEV_ACCOUNT_KEY)
                .map_err(|_| invalid("emulator key is not base64"))?;
            let blob_endpoint = Url::parse(DEV_BLOB_ENDPOINT).map_err(|_| invalid("BlobEndpoint"))?;
            return Ok(Self {
                blob_endpoint,
                credential: StorageCredential::SharedKey {
                    account: DEV_ACCOUNT.to_string(),
                    key,
                },
            });
        }

        let account = fields.get("accountname").cloned();
        let blob_endpoint = match fields.get("blobendpoint") {
            Some(endpoint) => {
                Url::parse(endpoint).map_err(|_| invalid("BlobEndpoint is not a valid URL"))?
            }
            None => {
                let account = account
                    .as_deref()
                    .ok_or_else(|| invalid("AccountName or BlobEndpoint is required"))?;
                let protocol = fields
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = fields
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                Url::parse(&format!("{protocol}://{account}.blob.{suffix}"))
                    .map_err(|_| invalid("cannot build blob endpoint from AccountName"))?
            }
        };
        if blob_endpoint.cannot_be_a_base() {
            return Err(invalid("BlobEndpoint must be a hierarchical URL"));
        }

        let credential = match (fields.get("accountkey"), fields.get("sharedaccesssignature")) {
            (Some(key), _) => {
                let account = account.ok_or_else(|| invalid("AccountKey requires AccountName"))?;
                let key = BASE64
                    .decode(key)
                    .map_err(|_| invalid("AccountKey is not valid base64"))?;
                StorageCredential::SharedKey { account, key }
            }
            (None, Some(sas)) => StorageCredential::Sas(sas.trim_start_matches('?').to_string()),
            (None, None) => return Err(invalid("AccountKey or SharedAccessSignature is required")),
        };

        Ok(Self {
            blob_endpoint,
            credential,
        })
    }

    /// URL of `object_name` in `container`, without any SAS query.
    pub fn blob_url(&self, container: &str, object_name: &str) -> Result<Url, UploadError> {
        let mut url = self.blob_endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidUrl(self.blob_endpoint.to_string()))?
            .pop_if_empty()
            .push(container)
            .push(object_name);
        Ok(url)
    }
}

/// Canonical Shared Key string-to-sign for a blob request.
///
/// `ms_headers` must hold every `x-ms-*` header sent, with lowercase names.
pub fn string_to_sign(
    method: &str,
    url: &Url,
    account: &str,
    content_length: usize,
    content_type: &str,
    if_none_match: Option<&str>,
    ms_headers: &BTreeMap<String, String>,
) -> String {
    // An empty body is signed as an empty Content-Length.
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };
    let mut out = format!(
        "{method}\n\n\n{length}\n\n{content_type}\n\n\n\n{}\n\n\n",
        if_none_match.unwrap_or("")
    );
    for (name, value) in ms_headers {
        out.push_str(&format!("{name}:{value}\n"));
    }
    out.push_str(&format!("/{account}{}", url.path()));

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        query
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in query {
        values.sort();
        out.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    out
}

/// Base64 HMAC-SHA256 of `string_to_sign` under the decoded account key.
pub fn sign(key: &[u8], string_to_sign: &str) -> Result<String, UploadError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| UploadError::Signing(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

pub struct AzureBlobClient {
    client: Client,
    account: StorageAccount,
}

impl AzureBlobClient {
    pub fn new(account: StorageAccount) -> Self {
        Self {
            client: Client::new(),
            account,
        }
    }

    pub fn from_connection_string(raw: &str) -> Result<Self, ConfigError> {
        let account = StorageAccount::from_connection_string(raw)?;
        info!(
            blob_endpoint = %account.blob_endpoint,
            credential = ?account.credential,
            "Initialized AzureBlobClient from connection string"
        );
        Ok(Self::new(account))
    }
}

#[async_trait]
impl BlobSink for AzureBlobClient {
    async fn put(
        &self,
        container: &str,
        object_name: &str,
        content: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        let mut url = self.account.blob_url(container, object_name)?;
        let if_none_match = (!overwrite).then_some("*");

        let mut ms_headers = BTreeMap::new();
        ms_headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
        ms_headers.insert(
            "x-ms-client-request-id".to_string(),
            Uuid::new_v4().to_string(),
        );
        ms_headers.insert(
            "x-ms-date".to_string(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        ms_headers.insert("x-ms-version".to_string(), STORAGE_API_VERSION.to_string());

        let authorization = match &self.account.credential {
            StorageCredential::SharedKey { account, key } => {
                let to_sign = string_to_sign(
                    "PUT",
                    &url,
                    account,
                    content.len(),
                    CONTENT_TYPE,
                    if_none_match,
                    &ms_headers,
                );
                Some(format!("SharedKey {account}:{}", sign(key, &to_sign)?))
            }
            StorageCredential::Sas(sas) => {
                url.set_query(Some(sas.as_str()));
                None
            }
        };

        debug!(
            container,
            object_name,
            size = content.len(),
            "[UPLOAD] Sending Put Blob request"
        );
        let mut request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE);
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(value) = if_none_match {
            request = request.header(reqwest::header::IF_NONE_MATCH, value);
        }
        if let Some(value) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, value);
        }

        let response = request.body(content).send().await?;
        let status = response.status();
        if status.is_success() {
            info!(container, object_name, status = status.as_u16(), "[UPLOAD] Blob stored");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(
                container,
                object_name,
                status = status.as_u16(),
                "[UPLOAD][ERROR] Blob service rejected upload"
            );
            Err(UploadError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_account_key_connection_string() {
        let account = StorageAccount::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=logsacct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(
            account.blob_endpoint.as_str(),
            "https://logsacct.blob.core.windows.net/"
        );
        assert_eq!(
            account.credential,
            StorageCredential::SharedKey {
                account: "logsacct".into(),
                key: b"key".to_vec()
            }
        );
    }

    #[test]
    fn parses_sas_connection_string_with_blob_endpoint() {
        let account = StorageAccount::from_connection_string(
            "BlobEndpoint=https://logsacct.blob.core.windows.net;SharedAccessSignature=?sv=2021-08-06&sig=abc%3D",
        )
        .unwrap();
        assert_eq!(
            account.credential,
            StorageCredential::Sas("sv=2021-08-06&sig=abc%3D".into())
        );
    }

    #[test]
    fn development_storage_points_at_emulator() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        assert_eq!(account.blob_endpoint.as_str(), DEV_BLOB_ENDPOINT);
        assert!(matches!(
            account.credential,
            StorageCredential::SharedKey { ref account, .. } if account == DEV_ACCOUNT
        ));
    }

    #[test]
    fn rejects_connection_string_without_credentials() {
        let err = StorageAccount::from_connection_string("AccountName=logsacct").unwrap_err();
        assert!(err.to_string().contains("AccountKey or SharedAccessSignature"));
    }

    #[test]
    fn rejects_malformed_segment() {
        assert!(StorageAccount::from_connection_string("garbage").is_err());
    }

    #[test]
    fn blob_url_encodes_object_name() {
        let account = StorageAccount::from_connection_string(
            "BlobEndpoint=https://logsacct.blob.core.windows.net/;SharedAccessSignature=sig=x",
        )
        .unwrap();
        let url = account.blob_url("processed-logs", "processed_20240101_000000_my app.log").unwrap();
        assert_eq!(
            url.as_str(),
            "https://logsacct.blob.core.windows.net/processed-logs/processed_20240101_000000_my%20app.log"
        );
    }

    #[test]
    fn shared_key_signature_matches_known_vector() {
        let account = StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap();
        let url = account
            .blob_url("processed-logs", "processed_20240101_000000_a.log")
            .unwrap();
        let mut ms_headers = BTreeMap::new();
        ms_headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
        ms_headers.insert(
            "x-ms-client-request-id".to_string(),
            "00000000-0000-0000-0000-000000000000".to_string(),
        );
        ms_headers.insert(
            "x-ms-date".to_string(),
            "Mon, 01 Jan 2024 00:00:00 GMT".to_string(),
        );
        ms_headers.insert("x-ms-version".to_string(), STORAGE_API_VERSION.to_string());

        let to_sign = string_to_sign("PUT", &url, DEV_ACCOUNT, 14, CONTENT_TYPE, None, &ms_headers);
        assert_eq!(
            to_sign,
            "PUT\n\n\n14\n\ntext/plain; charset=utf-8\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-client-request-id:00000000-0000-0000-0000-000000000000\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
             x-ms-version:2021-08-06\n\
             /devstoreaccount1/devstoreaccount1/processed-logs/processed_20240101_000000_a.log"
        );

        let StorageCredential::SharedKey { key, .. } = &account.credential else {
            panic!("emulator uses a shared key");
        };
        assert_eq!(
            sign(key, &to_sign).unwrap(),
            "+gaaTol0bAy9t0MsEKqcZuyhIGJdNK7zYfS2LzLckb0="
        );
    }

    #[test]
    fn empty_body_signs_empty_length_and_if_none_match() {
        let url = Url::parse("https://acct.blob.core.windows.net/c/b").unwrap();
        let to_sign = string_to_sign(
            "PUT",
            &url,
            "acct",
            0,
            CONTENT_TYPE,
            Some("*"),
            &BTreeMap::new(),
        );
        assert_eq!(
            to_sign,
            "PUT\n\n\n\n\ntext/plain; charset=utf-8\n\n\n\n*\n\n\n/acct/c/b"
        );
    }
}
