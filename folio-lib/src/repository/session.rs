//! Who is acting right now, and how that survives a restart.
//!
//! The [`Session`] is created once by the [`crate::Repository`] and shared as a [`SessionHandle`].
//! Only the identity and admin components write to it; everything else reads.

use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{Result, fs::state_dir};

const FILE_NAME: &str = "session.toml";

pub type SessionHandle = Arc<RwLock<Session>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    current_user: Option<String>,
    current_cert_user: Option<String>,
    admin_token: Option<String>,
}

impl Session {
    /// The logged in student, owner of the portfolio being edited
    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    /// The student whose certificates are being viewed. May differ from [`Session::current_user`].
    pub fn current_cert_user(&self) -> Option<&str> {
        self.current_cert_user.as_deref()
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.admin_token.is_some()
    }

    pub(crate) fn set_current_user(&mut self, name: Option<String>) {
        self.current_user = name;
    }

    pub(crate) fn set_current_cert_user(&mut self, name: Option<String>) {
        self.current_cert_user = name;
    }

    pub(crate) fn set_admin_token(&mut self, token: Option<String>) {
        self.admin_token = token;
    }
}

impl From<SavedSession> for Session {
    fn from(saved: SavedSession) -> Self {
        Self {
            current_user: saved.student_name,
            current_cert_user: saved.cert_viewer_name,
            admin_token: saved.admin_token,
        }
    }
}

/// The durable copy of a [`Session`]. Each key is overwritten on login and removed on logout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_viewer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// Local persistence for the [`SavedSession`].
pub trait SessionStore: Debug + Send + Sync {
    /// Returns the saved session, or an empty one if nothing was saved yet.
    fn load(&self) -> Result<SavedSession>;

    fn save(&self, session: &SavedSession) -> Result<()>;

    /// Read, modify and write back the saved session.
    fn update(&self, f: &dyn Fn(&mut SavedSession)) -> Result<()> {
        let mut saved = self.load()?;
        f(&mut saved);
        self.save(&saved)
    }
}

/// Keeps the session in a TOML file in the state directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new() -> Result<Self> {
        Ok(Self::at(state_dir()?.join(FILE_NAME)))
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<SavedSession> {
        if !self.path.exists() {
            return Ok(SavedSession::default());
        }

        let contents = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn save(&self, session: &SavedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, toml::to_string_pretty(session)?)?;

        Ok(())
    }
}

/// Keeps the session in memory. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    saved: Mutex<SavedSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<SavedSession> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, session: &SavedSession) -> Result<()> {
        *self.saved.lock() = session.clone();
        Ok(())
    }
}
