pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod flow;
pub mod logging;
pub mod models;
pub mod phone;
pub mod reconcile;
pub mod routes;
pub mod store;
pub mod test_util;

pub use accounts::{AccountProvider, IdentityToolkitClient};
pub use auth::{JwksVerifier, SessionIssuer, TokenVerifier};
pub use config::Config;
pub use flow::{AuthFlow, FlowOptions};
pub use reconcile::Reconciler;
pub use store::{SqliteUserStore, UserStore};

use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn UserStore>,
    /// Password account creation at the identity platform.
    pub accounts: Arc<dyn AccountProvider>,
    pub sessions: Arc<SessionIssuer>,
    pub reconciler: Arc<Reconciler>,
    pub flow: AuthFlow,
}

impl AppState {
    pub fn new(
        config: Config,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn UserStore>,
        accounts: Arc<dyn AccountProvider>,
    ) -> Self {
        let call_timeout = config.timeouts.external_call();
        let sessions = Arc::new(SessionIssuer::new(
            verifier.clone(),
            config.session.secret.as_bytes(),
            config.session.ttl(),
        ));
        let reconciler = Arc::new(Reconciler::new(store.clone(), call_timeout));
        let flow = AuthFlow::new(
            verifier,
            reconciler.clone(),
            sessions.clone(),
            call_timeout,
        );

        Self {
            config,
            store,
            accounts,
            sessions,
            reconciler,
            flow,
        }
    }
}
