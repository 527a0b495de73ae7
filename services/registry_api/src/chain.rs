//! Minimal Soroban JSON-RPC client used by the blockchain endpoints.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed RPC response: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedger {
    pub id: String,
    pub protocol_version: u32,
    pub sequence: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
}

/// `getTransaction` result. `status` is SUCCESS, FAILED or NOT_FOUND;
/// the ledger fields are absent until the transaction is found.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub status: String,
    pub latest_ledger: u32,
    pub ledger: Option<u32>,
    pub created_at: Option<String>,
    pub application_order: Option<u32>,
}

pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url: url.to_string() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T, ChainError> {
        let mut body = json!({ "jsonrpc": "2.0", "id": 1, "method": method });
        if let Some(params) = params {
            body["params"] = params;
        }
        let resp: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(err) = resp.error {
            return Err(ChainError::Rpc { code: err.code, message: err.message });
        }
        resp.result
            .ok_or_else(|| ChainError::Malformed(format!("{method}: missing result")))
    }

    pub async fn latest_ledger(&self) -> Result<LatestLedger, ChainError> {
        self.call("getLatestLedger", None).await
    }

    pub async fn health(&self) -> Result<Health, ChainError> {
        self.call("getHealth", None).await
    }

    pub async fn transaction(&self, hash: &str) -> Result<TransactionInfo, ChainError> {
        self.call("getTransaction", Some(json!({ "hash": hash }))).await
    }
}
