//! Device directory client.
//!
//! # Responsibilities
//! - Register a provisioned identity with the external directory
//! - Delete the device when its service is released
//!
//! # Design Decisions
//! - Registration authenticates with the auth key, deletion with the API key
//! - Without an API key deletion is skipped; the device ages out on its own
//! - Every call is bounded by a request timeout

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::identity::{Identity, ProvisionError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Registration<'a> {
    id: &'a str,
    hostname: &'a str,
    addresses: Vec<String>,
}

/// HTTP client for the device directory.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base: Url,
    auth_key: String,
    api_key: Option<String>,
}

impl DirectoryClient {
    pub fn new(base: Url, auth_key: String, api_key: Option<String>) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProvisionError::Directory(e.to_string()))?;

        Ok(Self {
            client,
            base,
            auth_key,
            api_key,
        })
    }

    fn devices_url(&self, id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        let base = self.base.path().trim_end_matches('/');
        match id {
            Some(id) => url.set_path(&format!("{}/devices/{}", base, id)),
            None => url.set_path(&format!("{}/devices", base)),
        }
        url
    }

    /// Announce `identity` to the directory.
    pub async fn register(&self, identity: &Identity) -> Result<(), ProvisionError> {
        let addresses = std::iter::once(identity.plaintext_addr)
            .chain(identity.tls_addr)
            .map(|addr| addr.to_string())
            .collect();

        let response = self
            .client
            .post(self.devices_url(None))
            .bearer_auth(&self.auth_key)
            .json(&Registration {
                id: &identity.id,
                hostname: &identity.hostname,
                addresses,
            })
            .send()
            .await
            .map_err(|e| ProvisionError::Directory(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProvisionError::Directory(format!(
                "registration of {} rejected with status {}",
                identity.hostname,
                response.status()
            )));
        }

        tracing::info!(hostname = %identity.hostname, id = %identity.id, "Device registered");
        Ok(())
    }

    /// Remove `identity` from the directory. A device already gone counts as removed.
    pub async fn deregister(&self, identity: &Identity) -> Result<(), ProvisionError> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(
                hostname = %identity.hostname,
                "API key not configured, skipping device deletion"
            );
            return Ok(());
        };

        let response = self
            .client
            .delete(self.devices_url(Some(&identity.id)))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| ProvisionError::Directory(e.to_string()))?;

        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => {
                tracing::info!(hostname = %identity.hostname, id = %identity.id, "Device deleted");
                Ok(())
            }
            status => Err(ProvisionError::Directory(format!(
                "deletion of {} failed with status {}",
                identity.hostname, status
            ))),
        }
    }
}
