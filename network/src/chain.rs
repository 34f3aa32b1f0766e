//! Chain account lookups.
//!
//! `POST {eos_url}/v1/chain/get_account` with `{"account_name": ...}`; the
//! trusted key is the first key of the `active` permission.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::NetworkError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves an account name to its current public key.
pub trait ChainAccounts: Send + Sync + 'static {
    /// The raw `active` permission key, network prefix included.
    fn active_key(&self, account: &str) -> impl Future<Output = Result<String, NetworkError>> + Send;
}

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[derive(Deserialize)]
struct Permission {
    perm_name: String,
    required_auth: RequiredAuth,
}

#[derive(Deserialize)]
struct RequiredAuth {
    #[serde(default)]
    keys: Vec<KeyWeight>,
}

#[derive(Deserialize)]
struct KeyWeight {
    key: String,
}

pub struct EosAccountClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl EosAccountClient {
    pub fn new(base_url: &str) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }
}

impl ChainAccounts for EosAccountClient {
    async fn active_key(&self, account: &str) -> Result<String, NetworkError> {
        let url = format!("{}/v1/chain/get_account", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "account_name": account }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NetworkError::RequestFailed(format!(
                "HTTP status {} for account {account}",
                response.status()
            )));
        }
        let body: AccountResponse = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        body.permissions
            .into_iter()
            .find(|p| p.perm_name == "active")
            .and_then(|p| p.required_auth.keys.into_iter().next())
            .map(|k| k.key)
            .ok_or_else(|| {
                NetworkError::InvalidResponse(format!("account {account} has no active key"))
            })
    }
}
