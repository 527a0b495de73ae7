//! Document pinning.
//!
//! Two backends: a kubo node reached over its HTTP API, or the local
//! database when no node is configured. Both are content addressed; the
//! embedded backend uses the sha256 hex digest as the hash.

use reqwest::multipart;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum PinError {
    #[error("IPFS node unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IPFS node error: {0}")]
    Upstream(String),

    #[error("content {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub enum Pinner {
    Kubo {
        client: reqwest::Client,
        api_url: String,
        gateway: String,
    },
    Embedded {
        store: Store,
    },
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl Pinner {
    pub fn kubo(api_url: &str, gateway: &str) -> Self {
        Pinner::Kubo {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            gateway: gateway.trim_end_matches('/').to_string(),
        }
    }

    pub fn embedded(store: Store) -> Self {
        Pinner::Embedded { store }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Pinner::Kubo { .. } => "ipfs",
            Pinner::Embedded { .. } => "embedded",
        }
    }

    /// Pin `bytes` and return their content hash.
    pub async fn add(&self, filename: &str, bytes: Vec<u8>) -> Result<String, PinError> {
        match self {
            Pinner::Kubo { client, api_url, .. } => {
                let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
                let form = multipart::Form::new().part("file", part);
                let resp = client
                    .post(format!("{api_url}/api/v0/add"))
                    .query(&[("pin", "true"), ("cid-version", "1")])
                    .multipart(form)
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(PinError::Upstream(format!("add returned {status}: {body}")));
                }
                let added: AddResponse = resp.json().await?;
                info!(hash = %added.hash, filename, "pinned to IPFS");
                Ok(added.hash)
            }
            Pinner::Embedded { store } => {
                let digest = sha256_hex(&bytes);
                store.put_blob(&digest, &bytes)?;
                debug!(hash = %digest, filename, "pinned to local store");
                Ok(digest)
            }
        }
    }

    pub async fn fetch(&self, hash: &str) -> Result<Vec<u8>, PinError> {
        match self {
            Pinner::Kubo { client, gateway, .. } => {
                let resp = client.get(format!("{gateway}/ipfs/{hash}")).send().await?;
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(PinError::NotFound(hash.to_string()));
                }
                if !resp.status().is_success() {
                    return Err(PinError::Upstream(format!(
                        "gateway returned {} for {hash}",
                        resp.status()
                    )));
                }
                Ok(resp.bytes().await?.to_vec())
            }
            Pinner::Embedded { store } => store
                .get_blob(hash)?
                .ok_or_else(|| PinError::NotFound(hash.to_string())),
        }
    }

    /// Public URL for a hash, when there is one.
    pub fn gateway_url(&self, hash: &str) -> Option<String> {
        match self {
            Pinner::Kubo { gateway, .. } => Some(format!("{gateway}/ipfs/{hash}")),
            Pinner::Embedded { .. } => None,
        }
    }
}
