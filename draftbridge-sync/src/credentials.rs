//! Per-company, per-provider OAuth credential management.
//!
//! Adapters ask for a token before every remote call. A token within 60
//! seconds of expiry is refreshed before use, not after a failed call;
//! refreshes for a given (company, provider) pair are single-flighted so
//! concurrent reconciliations cannot race and invalidate each other's
//! token.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Duration as TimeDelta, Utc};
use draftbridge_types::{CompanyId, Provider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Seconds before expiry at which a token is considered stale.
const REFRESH_WINDOW_SECS: i64 = 60;

/// Fallback token lifetime when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// OAuth token endpoint for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthEndpoint {
    /// Full token URL (e.g. `https://oauth.example.com/token`).
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// A stored credential for one (company, provider) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// Holds credentials and refreshes expired tokens transparently.
pub struct CredentialManager {
    client: Client,
    endpoints: HashMap<Provider, OAuthEndpoint>,
    credentials: RwLock<HashMap<(CompanyId, Provider), StoredCredential>>,
    refresh_locks: Mutex<HashMap<(CompanyId, Provider), Arc<Mutex<()>>>>,
}

impl CredentialManager {
    /// Creates a manager with the given token endpoints.
    #[must_use]
    pub fn new(endpoints: HashMap<Provider, OAuthEndpoint>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            endpoints,
            credentials: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a credential (e.g. captured by the host's OAuth callback).
    pub async fn set_credential(
        &self,
        company: CompanyId,
        provider: Provider,
        credential: StoredCredential,
    ) {
        self.credentials
            .write()
            .await
            .insert((company, provider), credential);
    }

    /// Removes a stored credential.
    pub async fn remove_credential(&self, company: CompanyId, provider: Provider) {
        self.credentials.write().await.remove(&(company, provider));
    }

    /// Returns a valid access token for the pair, refreshing first if the
    /// stored token is within the refresh window. Fails with
    /// [`SyncError::CredentialUnavailable`] when no usable credential
    /// exists; callers must treat that as "cannot proceed", never as
    /// "proceed unauthenticated".
    pub async fn get_valid_token(
        &self,
        company: CompanyId,
        provider: Provider,
    ) -> SyncResult<String> {
        if let Some(token) = self.fresh_token(company, provider).await {
            return Ok(token);
        }

        // Single-flight the refresh for this pair.
        let lock = self.refresh_lock(company, provider).await;
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.fresh_token(company, provider).await {
            return Ok(token);
        }

        self.refresh(company, provider).await
    }

    async fn fresh_token(&self, company: CompanyId, provider: Provider) -> Option<String> {
        let credentials = self.credentials.read().await;
        let credential = credentials.get(&(company, provider))?;
        let stale_at = credential.expires_at - TimeDelta::seconds(REFRESH_WINDOW_SECS);
        if Utc::now() < stale_at {
            Some(credential.access_token.clone())
        } else {
            None
        }
    }

    async fn refresh_lock(&self, company: CompanyId, provider: Provider) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry((company, provider))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn refresh(&self, company: CompanyId, provider: Provider) -> SyncResult<String> {
        let endpoint =
            self.endpoints
                .get(&provider)
                .ok_or(SyncError::CredentialUnavailable { company, provider })?;

        let refresh_token = {
            let credentials = self.credentials.read().await;
            credentials
                .get(&(company, provider))
                .and_then(|c| c.refresh_token.clone())
                .ok_or(SyncError::CredentialUnavailable { company, provider })?
        };

        debug!(%company, %provider, "refreshing access token");

        let response = self
            .client
            .post(&endpoint.token_url)
            .form(&[
                ("client_id", endpoint.client_id.as_str()),
                ("client_secret", endpoint.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%company, %provider, %status, "token refresh rejected: {body}");
            return Err(SyncError::CredentialUnavailable { company, provider });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("failed to parse token response: {e}")))?;

        let lifetime = token_response
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let credential = StoredCredential {
            access_token: token_response.access_token.clone(),
            refresh_token: token_response.refresh_token.or(Some(refresh_token)),
            expires_at: Utc::now() + TimeDelta::seconds(lifetime as i64),
        };

        self.credentials
            .write()
            .await
            .insert((company, provider), credential);

        debug!(%company, %provider, "access token refreshed");
        Ok(token_response.access_token)
    }
}
