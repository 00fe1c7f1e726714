//! Request flow shared by the token-based auth routes.
//!
//! Each request moves linearly through
//! `Unverified -> Verified -> Reconciled -> SessionIssued -> Responded`.
//! There is no compensation step: a record created before a failed session
//! issuance stays, and retrying the request is safe.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use marketplace_common::Provider;

use crate::auth::{AuthError, SessionCredential, SessionIssuer, TokenVerifier};
use crate::error::ApiError;
use crate::reconcile::{Reconciler, Reconciliation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unverified,
    Verified,
    Reconciled,
    SessionIssued,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Unverified => "unverified",
            Stage::Verified => "verified",
            Stage::Reconciled => "reconciled",
            Stage::SessionIssued => "session_issued",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// What a route wants from the flow.
#[derive(Debug, Clone, Copy)]
pub struct FlowOptions {
    /// Provider recorded when the token does not name its sign-in method.
    pub provider: Provider,
    /// Mint a session credential after reconciliation.
    pub establish_session: bool,
    /// Fail with a conflict when the record already existed.
    pub require_new: bool,
}

impl FlowOptions {
    pub fn google() -> Self {
        Self {
            provider: Provider::Google,
            establish_session: false,
            require_new: false,
        }
    }

    pub fn with_session(mut self) -> Self {
        self.establish_session = true;
        self
    }

    pub fn registration(mut self) -> Self {
        self.require_new = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub uid: String,
    pub created: bool,
    pub session: Option<SessionCredential>,
    pub stage: Stage,
}

/// Sequences token verification, reconciliation and session issuance.
pub struct AuthFlow {
    verifier: Arc<dyn TokenVerifier>,
    reconciler: Arc<Reconciler>,
    sessions: Arc<SessionIssuer>,
    call_timeout: Duration,
}

impl AuthFlow {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        reconciler: Arc<Reconciler>,
        sessions: Arc<SessionIssuer>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            reconciler,
            sessions,
            call_timeout,
        }
    }

    pub async fn run(&self, token: &str, options: FlowOptions) -> Result<FlowOutcome, ApiError> {
        let mut stage = Stage::Unverified;
        tracing::debug!(%stage, provider = %options.provider, "Auth flow started");

        if token.trim().is_empty() {
            return Err(self.fail(stage, ApiError::MissingFields(vec!["idToken"])));
        }

        let claim = match self.bounded(self.verifier.verify(token)).await {
            Ok(claim) => claim,
            Err(err) => return Err(self.fail(stage, err.into())),
        };
        stage = self.advance(stage, Stage::Verified);

        let provider = claim.sign_in_provider.unwrap_or(options.provider);
        let Reconciliation { uid, created } =
            match self.reconciler.reconcile(&claim, provider).await {
                Ok(reconciliation) => reconciliation,
                Err(err) => return Err(self.fail(stage, err.into())),
            };
        stage = self.advance(stage, Stage::Reconciled);

        if options.require_new && !created {
            let message = format!("User {uid} is already registered");
            return Err(self.fail(stage, ApiError::already_exists(message, Some(uid))));
        }

        let session = if options.establish_session {
            let ttl = self.sessions.default_ttl();
            match self.bounded(self.sessions.issue_session(token, ttl)).await {
                Ok(credential) => {
                    stage = self.advance(stage, Stage::SessionIssued);
                    Some(credential)
                }
                Err(err) => return Err(self.fail(stage, err.into())),
            }
        } else {
            None
        };

        stage = self.advance(stage, Stage::Responded);
        Ok(FlowOutcome {
            uid,
            created,
            session,
            stage,
        })
    }

    /// Bound a verifier call. Expiry counts as a verification failure.
    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .unwrap_or_else(|_| Err(AuthError::InvalidToken("Verification timed out".to_string())))
    }

    fn advance(&self, from: Stage, to: Stage) -> Stage {
        tracing::debug!(from = %from, to = %to, "Auth flow transition");
        to
    }

    fn fail(&self, stage: Stage, err: ApiError) -> ApiError {
        tracing::debug!(
            from = %stage,
            to = %Stage::Responded,
            status = err.status().as_u16(),
            "Auth flow failed: {}",
            err
        );
        err
    }
}
