use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    Result,
    repository::{
        config::{Cfg, CoreConfig},
        entities::{Admin, Certificates, Identity, Portfolios},
        remote::Client,
        session::{FileSessionStore, Session, SessionHandle, SessionStore},
    },
};

pub mod config;
pub mod entities;
pub mod models;
pub mod remote;
pub mod session;

/// Central access point for all student data.
///
/// The [`Repository`] owns the configuration, the session context and the remote client, and
/// wires them into the components it hands out. Components created from the same repository
/// share one session, so logging in through [`Repository::identity`] is immediately seen by
/// [`Repository::portfolios`] and the rest.
#[derive(Clone, Debug)]
pub struct Repository {
    client: Client,
    cfg: Cfg,
    session: SessionHandle,
    store: Arc<dyn SessionStore>,
}

impl Repository {
    /// Open the repository described by the configuration file, keeping the session in the state
    /// directory.
    pub fn new() -> Result<Self> {
        let cfg = CoreConfig::load()?;
        let client = Client::from_config(&cfg.remote)?;

        Ok(Self::with_parts(cfg, client, Arc::new(FileSessionStore::new()?)))
    }

    pub fn with_parts(cfg: CoreConfig, client: Client, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            cfg: Arc::new(RwLock::new(cfg)),
            session: Arc::new(RwLock::new(Session::default())),
            store,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(
            self.client.clone(),
            self.session.clone(),
            self.store.clone(),
            self.cfg.clone(),
        )
    }

    pub fn portfolios(&self) -> Portfolios {
        Portfolios::new(self.client.clone(), self.session.clone(), self.cfg.clone())
    }

    pub fn certificates(&self) -> Certificates {
        Certificates::new(
            self.client.clone(),
            self.identity(),
            self.session.clone(),
            self.cfg.clone(),
        )
    }

    pub fn admin(&self) -> Admin {
        Admin::new(self.client.clone(), self.identity(), self.cfg.clone())
    }

    /// A snapshot of who is logged in right now
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    pub fn config(&self) -> Cfg {
        self.cfg.clone()
    }

    #[cfg(test)]
    /// Return a mock version of a [`Repository`] with an in-memory store and session.
    pub(crate) fn mock() -> Self {
        Self::mock_with(Arc::new(remote::MemoryTransport::new()))
    }

    #[cfg(test)]
    /// A mock [`Repository`] talking to the given in-memory store.
    pub(crate) fn mock_with(transport: Arc<remote::MemoryTransport>) -> Self {
        let cfg = CoreConfig::mock();
        let client = Client::new(transport, cfg.remote.timeout(), cfg.remote.retry_backoff());

        Self::with_parts(
            cfg,
            client,
            Arc::new(session::MemorySessionStore::new()),
        )
    }

    #[cfg(test)]
    /// The same store and saved session with a blank session context, as after a restart.
    pub(crate) fn restarted(&self) -> Self {
        Self {
            session: Arc::new(RwLock::new(Session::default())),
            ..self.clone()
        }
    }
}
