//! "Does this user hold the app benefit?" lookups against the payments
//! provider, with a per-user TTL cache in front.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

/// How long a lookup result is reused before asking the provider again.
pub const ENTITLEMENT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors from an entitlement lookup.
#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Payments API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    async fn has_app_benefit(&self, user_id: &str) -> Result<bool, EntitlementError>;
}

/// Provider used when no payments integration is configured: nobody holds
/// the benefit.
pub struct NoEntitlements;

#[async_trait]
impl EntitlementProvider for NoEntitlements {
    async fn has_app_benefit(&self, _user_id: &str) -> Result<bool, EntitlementError> {
        Ok(false)
    }
}

#[derive(Debug, Deserialize)]
struct CustomerState {
    #[serde(default)]
    granted_benefits: Vec<GrantedBenefit>,
}

#[derive(Debug, Deserialize)]
struct GrantedBenefit {
    benefit_id: String,
}

/// HTTP client for the payments provider's customer-state endpoint.
pub struct PaymentsApi {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    benefit_id: String,
}

impl PaymentsApi {
    /// * `api_url` - Base URL, e.g. `https://api.payments.example`.
    /// * `benefit_id` - The benefit that unlocks the larger quota.
    pub fn new(api_url: String, token: Option<String>, benefit_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            benefit_id,
        }
    }
}

#[async_trait]
impl EntitlementProvider for PaymentsApi {
    async fn has_app_benefit(&self, user_id: &str) -> Result<bool, EntitlementError> {
        let mut request = self
            .client
            .get(format!("{}/v1/customers/external/{user_id}/state", self.api_url));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        // Users who never checked out have no customer record.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EntitlementError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let state: CustomerState = response.json().await?;
        Ok(state
            .granted_benefits
            .iter()
            .any(|benefit| benefit.benefit_id == self.benefit_id))
    }
}

/// Caches another provider's answers per user for a fixed TTL.
pub struct CachedEntitlements<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, (bool, Instant)>>,
}

impl<P: EntitlementProvider> CachedEntitlements<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Forget the cached answer for `user_id`.
    pub fn invalidate(&self, user_id: &str) {
        self.entries.lock().remove(user_id);
    }

    fn cached(&self, user_id: &str) -> Option<bool> {
        let mut entries = self.entries.lock();
        match entries.get(user_id) {
            Some((value, at)) if at.elapsed() < self.ttl => Some(*value),
            Some(_) => {
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<P: EntitlementProvider> EntitlementProvider for CachedEntitlements<P> {
    async fn has_app_benefit(&self, user_id: &str) -> Result<bool, EntitlementError> {
        if let Some(value) = self.cached(user_id) {
            return Ok(value);
        }
        let value = self.inner.has_app_benefit(user_id).await?;
        self.entries
            .lock()
            .insert(user_id.to_string(), (value, Instant::now()));
        tracing::debug!(user_id, has_app_benefit = value, "Entitlement cached");
        Ok(value)
    }
}
