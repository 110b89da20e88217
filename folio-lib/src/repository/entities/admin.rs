use base64::{Engine, engine::general_purpose};
use tracing::{debug, warn};

use crate::{
    Error, Notice, Result,
    repository::{
        config::Cfg,
        entities::{DeleteOutcome, Identity},
        models::{CertificateRecord, ExportKind, PortfolioItem},
        remote::{self, Client, Request, Response},
    },
};

/// Everything an administrator sees at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminDashboard {
    pub portfolios: Vec<PortfolioItem>,
    pub certificates: Vec<CertificateRecord>,
}

/// Administrator access to every student's data.
///
/// The password is checked by the store, which hands back a token. The token is kept in the
/// session and sent with every other admin call.
#[derive(Debug, Clone)]
pub struct Admin {
    client: Client,
    identity: Identity,
    cfg: Cfg,
    dashboard: AdminDashboard,
}

impl Admin {
    pub(crate) fn new(client: Client, identity: Identity, cfg: Cfg) -> Self {
        Self {
            client,
            identity,
            cfg,
            dashboard: AdminDashboard::default(),
        }
    }

    pub fn dashboard(&self) -> &AdminDashboard {
        &self.dashboard
    }

    pub fn is_logged_in(&self) -> bool {
        self.identity.admin_token().is_some()
    }

    pub async fn login(&self, password: &str) -> Result<Notice> {
        let token = self
            .client
            .call(Request::AdminLogin {
                password: password.to_string(),
            })
            .await?
            .into_token()?;

        self.identity.set_admin_token(token)?;
        debug!("Administrator logged in");

        Ok(Notice::AdminLoggedIn)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.identity.clear_admin_token()?;
        self.dashboard = AdminDashboard::default();

        Ok(())
    }

    /// Reload all portfolios and certificates. Either list is left empty if it can't be read.
    pub async fn refresh(&mut self) -> Result<&AdminDashboard> {
        let token = self.token()?;
        let limit = self.cfg.read().remote.page_limit;

        let (portfolios, certificates) = tokio::join!(
            self.client.call(Request::AdminListPortfolios {
                token: token.clone(),
                limit,
            }),
            self.client.call(Request::AdminListCertificates { token, limit }),
        );

        self.dashboard = AdminDashboard {
            portfolios: portfolios
                .and_then(Response::into_portfolios)
                .unwrap_or_else(|e| {
                    warn!("Could not load portfolios: {e}");
                    Vec::new()
                }),
            certificates: certificates
                .and_then(Response::into_certificates)
                .unwrap_or_else(|e| {
                    warn!("Could not load certificates: {e}");
                    Vec::new()
                }),
        };

        Ok(&self.dashboard)
    }

    /// Delete any student's portfolio item once `confirm` agrees to it.
    pub async fn delete_portfolio(
        &mut self,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<DeleteOutcome> {
        let token = self.token()?;

        if !confirm(id) {
            return Ok(DeleteOutcome::Declined);
        }

        self.client
            .call(Request::AdminDeletePortfolio {
                token,
                id: id.to_string(),
            })
            .await?
            .into_done()?;
        self.refresh().await?;

        Ok(DeleteOutcome::Deleted)
    }

    /// The CSV export of one collection, as produced by the store.
    pub async fn export(&self, kind: ExportKind) -> Result<Vec<u8>> {
        let token = self.token()?;
        let encoded = self
            .client
            .call(Request::AdminExport { token, kind })
            .await?
            .into_export()?;

        general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::from(remote::Error::Protocol(format!("invalid export payload: {e}"))))
    }

    fn token(&self) -> Result<String> {
        self.identity.admin_token().ok_or(Error::NotAuthorized)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        Repository,
        repository::{
            models::{ImagePayload, PortfolioFields},
            remote::{Failure, MemoryTransport},
        },
    };

    const PASSWORD: &str = "hunter2";

    fn store() -> Arc<MemoryTransport> {
        let store = MemoryTransport::new().with_admin_password(PASSWORD);
        for (student, title) in [("Kim", "Line tracer"), ("Lee", "Weather station")] {
            store.seed_portfolio(PortfolioFields {
                student_name: student.into(),
                category: "IoT".into(),
                title: title.into(),
                description: "desc".into(),
                image: ImagePayload::Empty,
            });
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_requires_token() {
        let repo = Repository::mock_with(store());
        let mut admin = repo.admin();

        assert!(matches!(admin.refresh().await, Err(Error::NotAuthorized)));
        assert!(matches!(
            admin.export(ExportKind::Portfolios).await,
            Err(Error::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let repo = Repository::mock_with(store());
        let admin = repo.admin();

        let err = admin.login("guess").await.unwrap_err();

        assert!(matches!(err, Error::Remote(remote::Error::Server(_))));
        assert!(!admin.is_logged_in());
    }

    #[tokio::test]
    async fn test_dashboard_lists_everyone() {
        let repo = Repository::mock_with(store());
        let mut admin = repo.admin();

        assert_eq!(admin.login(PASSWORD).await.unwrap(), Notice::AdminLoggedIn);
        let dashboard = admin.refresh().await.unwrap();

        assert_eq!(dashboard.portfolios.len(), 2);
        assert!(dashboard.certificates.is_empty());
        assert!(repo.session().is_admin());
    }

    #[tokio::test]
    async fn test_delete_portfolio() {
        let store = store();
        let repo = Repository::mock_with(store.clone());
        let mut admin = repo.admin();
        admin.login(PASSWORD).await.unwrap();
        admin.refresh().await.unwrap();
        let id = admin
            .dashboard()
            .portfolios
            .first()
            .map(|p| p.id.clone())
            .unwrap();

        let outcome = admin.delete_portfolio(&id, |_| false).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Declined);
        assert_eq!(store.portfolios().len(), 2);

        let outcome = admin.delete_portfolio(&id, |_| true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(admin.dashboard().portfolios.len(), 1);
        assert!(admin.dashboard().portfolios.iter().all(|p| p.id != id));
    }

    #[tokio::test]
    async fn test_export() {
        let repo = Repository::mock_with(store());
        let admin = repo.admin();
        admin.login(PASSWORD).await.unwrap();

        let csv = String::from_utf8(admin.export(ExportKind::Portfolios).await.unwrap()).unwrap();

        assert!(csv.starts_with("student_name,category,title,description"));
        assert!(csv.contains("\"Weather station\""));
    }

    #[tokio::test]
    async fn test_refresh_soft_fails() {
        let store = store();
        let repo = Repository::mock_with(store.clone());
        let mut admin = repo.admin();
        admin.login(PASSWORD).await.unwrap();
        store.set_failure(Some(Failure::Network));

        let dashboard = admin.refresh().await.unwrap();

        assert_eq!(dashboard, &AdminDashboard::default());
    }

    #[tokio::test]
    async fn test_logout() {
        let repo = Repository::mock_with(store());
        let mut admin = repo.admin();
        admin.login(PASSWORD).await.unwrap();

        admin.logout().unwrap();

        assert!(!admin.is_logged_in());
        let restarted = repo.restarted();
        restarted.identity().restore().unwrap();
        assert!(!restarted.session().is_admin());
    }
}
