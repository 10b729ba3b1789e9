//! Monthly request quota per user.

use std::sync::Arc;

use layoutgen_core::error::CoreError;
use layoutgen_core::quota::{monthly_quota, month_window, remaining};
use layoutgen_db::JobStore;
use serde::Serialize;

use super::entitlements::EntitlementProvider;
use crate::error::{AppError, AppResult};

/// What the client shows next to the prompt box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CustomerStatus {
    /// Requests left this calendar month.
    pub request_quota: i64,
    pub has_app_benefit: bool,
}

pub struct QuotaService {
    jobs: Arc<dyn JobStore>,
    entitlements: Arc<dyn EntitlementProvider>,
}

impl QuotaService {
    pub fn new(jobs: Arc<dyn JobStore>, entitlements: Arc<dyn EntitlementProvider>) -> Self {
        Self { jobs, entitlements }
    }

    /// Anonymous users never hold the benefit, so the provider is not asked.
    pub async fn has_app_benefit(&self, user_id: &str, is_anonymous: bool) -> AppResult<bool> {
        if is_anonymous {
            return Ok(false);
        }
        self.entitlements
            .has_app_benefit(user_id)
            .await
            .map_err(|e| AppError::Entitlements(e.to_string()))
    }

    pub async fn status(&self, user_id: &str, is_anonymous: bool) -> AppResult<CustomerStatus> {
        let has_app_benefit = self.has_app_benefit(user_id, is_anonymous).await?;
        let (from, until) = month_window(chrono::Utc::now());
        let used = self
            .jobs
            .count_jobs_created_between(user_id, from, until)
            .await?;

        Ok(CustomerStatus {
            request_quota: remaining(monthly_quota(has_app_benefit), used),
            has_app_benefit,
        })
    }

    /// Fail with `QuotaExceeded` if the user has no requests left.
    pub async fn ensure_available(&self, user_id: &str, is_anonymous: bool) -> AppResult<()> {
        let status = self.status(user_id, is_anonymous).await?;
        if status.request_quota <= 0 {
            tracing::info!(user_id, has_app_benefit = status.has_app_benefit, "Request quota exhausted");
            return Err(AppError::Core(CoreError::QuotaExceeded(
                "Monthly request quota exhausted".into(),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use layoutgen_core::replica::ReplicaId;
    use layoutgen_db::memory::MemoryJobStore;
    use layoutgen_db::models::job::NewJob;

    use super::*;
    use crate::billing::entitlements::{EntitlementError, NoEntitlements};

    struct Everyone;

    #[async_trait::async_trait]
    impl EntitlementProvider for Everyone {
        async fn has_app_benefit(&self, _user_id: &str) -> Result<bool, EntitlementError> {
            Ok(true)
        }
    }

    async fn store_with_jobs(user: &str, n: usize) -> Arc<MemoryJobStore> {
        let store = Arc::new(MemoryJobStore::new());
        for _ in 0..n {
            store
                .create_job(NewJob {
                    user_id: Some(user.into()),
                    replica_id: ReplicaId::new("a"),
                    prompt: "p".into(),
                    flags: None,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn free_user_gets_one_request() {
        let quota = QuotaService::new(store_with_jobs("u1", 0).await, Arc::new(NoEntitlements));
        let status = quota.status("u1", false).await.unwrap();
        assert_eq!(
            status,
            CustomerStatus {
                request_quota: 1,
                has_app_benefit: false
            }
        );
        assert!(quota.ensure_available("u1", false).await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_quota_is_rejected() {
        let quota = QuotaService::new(store_with_jobs("u1", 1).await, Arc::new(NoEntitlements));
        assert_eq!(quota.status("u1", false).await.unwrap().request_quota, 0);
        assert_matches!(
            quota.ensure_available("u1", false).await,
            Err(AppError::Core(CoreError::QuotaExceeded(_)))
        );
    }

    #[tokio::test]
    async fn benefit_raises_quota_but_not_for_anonymous_users() {
        let quota = QuotaService::new(store_with_jobs("u1", 3).await, Arc::new(Everyone));
        let status = quota.status("u1", false).await.unwrap();
        assert!(status.has_app_benefit);
        assert_eq!(status.request_quota, 47);

        let status = quota.status("u1", true).await.unwrap();
        assert!(!status.has_app_benefit);
        assert_eq!(status.request_quota, 0);
    }
}
