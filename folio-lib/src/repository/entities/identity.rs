use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    Notice, Result, ValidationError,
    repository::{
        config::Cfg,
        models::Student,
        remote::{Client, Request, Response},
        session::{SavedSession, Session, SessionHandle, SessionStore},
    },
};

/// Who is logged in, as a student, as a certificate viewer and as an administrator.
///
/// Every change is written to the [`SessionStore`] first and then to the session context shared
/// with the other components, so the same identity comes back after a restart. A change that
/// can't be saved is not applied.
#[derive(Debug, Clone)]
pub struct Identity {
    client: Client,
    session: SessionHandle,
    store: Arc<dyn SessionStore>,
    cfg: Cfg,
}

impl Identity {
    pub(crate) fn new(
        client: Client,
        session: SessionHandle,
        store: Arc<dyn SessionStore>,
        cfg: Cfg,
    ) -> Self {
        Self {
            client,
            session,
            store,
            cfg,
        }
    }

    /// Bring back whatever identity was saved last time.
    ///
    /// This never talks to the store and never produces a welcome notice. Returns the restored
    /// student, if any.
    pub fn restore(&self) -> Result<Option<String>> {
        let saved = self.store.load()?;
        let user = saved.student_name.clone();

        debug!(
            "Restored session: student {:?}, certificate viewer {:?}, admin {}",
            saved.student_name,
            saved.cert_viewer_name,
            saved.admin_token.is_some()
        );
        *self.session.write() = Session::from(saved);

        Ok(user)
    }

    pub fn current_user(&self) -> Option<String> {
        self.session.read().current_user().map(str::to_string)
    }

    /// Log in as the student `name`, registering them with the store if they are new.
    pub async fn login(&self, name: &str) -> Result<Notice> {
        let name = validate_name(name)?;

        // Records are keyed by name only, so a failed registration doesn't stop anyone working
        if let Err(e) = self
            .client
            .call(Request::EnsureStudent {
                name: name.to_string(),
            })
            .await
            .and_then(Response::into_done)
        {
            warn!("Could not register student '{name}': {e}");
        }

        self.store
            .update(&|s: &mut SavedSession| s.student_name = Some(name.to_string()))?;
        self.session
            .write()
            .set_current_user(Some(name.to_string()));

        debug!("Logged in as '{name}'");

        Ok(Notice::Welcome(name.to_string()))
    }

    pub fn logout(&self) -> Result<()> {
        self.store
            .update(&|s: &mut SavedSession| s.student_name = None)?;
        self.session.write().set_current_user(None);

        debug!("Logged out");

        Ok(())
    }

    pub fn current_cert_user(&self) -> Option<String> {
        self.session.read().current_cert_user().map(str::to_string)
    }

    /// Select whose certificates are being viewed. Returns the trimmed name.
    pub fn login_cert_viewer(&self, name: &str) -> Result<String> {
        let name = validate_name(name)?;

        self.store
            .update(&|s: &mut SavedSession| s.cert_viewer_name = Some(name.to_string()))?;
        self.session
            .write()
            .set_current_cert_user(Some(name.to_string()));

        debug!("Viewing certificates of '{name}'");

        Ok(name.to_string())
    }

    pub fn logout_cert_viewer(&self) -> Result<()> {
        self.store
            .update(&|s: &mut SavedSession| s.cert_viewer_name = None)?;
        self.session.write().set_current_cert_user(None);

        Ok(())
    }

    pub fn admin_token(&self) -> Option<String> {
        self.session.read().admin_token().map(str::to_string)
    }

    pub(crate) fn set_admin_token(&self, token: String) -> Result<()> {
        self.store
            .update(&|s: &mut SavedSession| s.admin_token = Some(token.clone()))?;
        self.session.write().set_admin_token(Some(token));

        Ok(())
    }

    pub(crate) fn clear_admin_token(&self) -> Result<()> {
        self.store
            .update(&|s: &mut SavedSession| s.admin_token = None)?;
        self.session.write().set_admin_token(None);

        Ok(())
    }

    /// Students known to the store, for quick login. Empty if the store can't be reached.
    pub async fn registered_students(&self) -> Vec<Student> {
        let limit = self.cfg.read().remote.page_limit;

        self.client
            .call(Request::ListStudents { limit })
            .await
            .and_then(Response::into_students)
            .unwrap_or_else(|e| {
                warn!("Could not list students: {e}");
                Vec::new()
            })
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        Err(ValidationError::EmptyName.into())
    } else {
        Ok(name)
    }
}
