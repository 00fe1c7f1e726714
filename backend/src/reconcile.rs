//! Identity reconciliation: make sure exactly one user record exists per
//! verified identity.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marketplace_common::Provider;

use crate::models::{IdentityClaim, UserRecord};
use crate::store::{StoreError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Malformed claim: {0}")]
    MalformedClaim(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub uid: String,
    /// Whether this call created the record.
    pub created: bool,
}

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Maps verified identities onto local user records.
pub struct Reconciler {
    store: Arc<dyn UserStore>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<dyn UserStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            call_timeout,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ensure a record exists for `claim`, creating it on first sight.
    ///
    /// Safe under concurrent duplicate calls: creation goes through the
    /// store's create-if-absent primitive, and a call that loses the race
    /// reports `created: false`.
    pub async fn reconcile(
        &self,
        claim: &IdentityClaim,
        provider: Provider,
    ) -> Result<Reconciliation, ReconcileError> {
        let uid = claim
            .subject()
            .ok_or_else(|| ReconcileError::MalformedClaim("missing subject id".to_string()))?;

        if let Some(existing) = self.call(|| self.store.get(uid)).await? {
            if existing.email_verified != claim.email_verified {
                let now = Utc::now();
                self.call(|| self.store.set_email_verified(uid, claim.email_verified, now))
                    .await?;
                tracing::info!(
                    uid = %uid,
                    email_verified = claim.email_verified,
                    "Corrected email verification state"
                );
            }
            return Ok(Reconciliation {
                uid: uid.to_string(),
                created: false,
            });
        }

        let record = UserRecord::from_claim(claim, provider, Utc::now());
        let created = self.call(|| self.store.create_if_absent(&record)).await?;

        if created {
            tracing::info!(uid = %uid, provider = %provider, "Created user record");
        } else {
            tracing::debug!(uid = %uid, "User record created concurrently, keeping existing");
        }

        Ok(Reconciliation {
            uid: uid.to_string(),
            created,
        })
    }

    /// Run a store call under the timeout, retrying transient failures.
    async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient store failure, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(ReconcileError::StoreUnavailable(err)),
            }
        }
    }
}
