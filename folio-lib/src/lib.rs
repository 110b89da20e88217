//! Client-side sync and cache layer for the folio student portfolio and
//! certificate tracker.
//!
//! Everything goes through a [`Repository`], which owns the configuration, the
//! session context and the remote client, and hands out the stateful
//! components ([`Identity`], [`Portfolios`], [`Certificates`], [`Admin`]).

use thiserror::Error;

pub mod fs;
pub mod notice;
pub mod repository;

pub use notice::Notice;
pub use repository::{
    Repository,
    entities::{Admin, Certificates, Identity, Portfolios},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] repository::remote::Error),
    #[error("Please log in first")]
    NotLoggedIn,
    #[error("Administrator login required")]
    NotAuthorized,
    #[error("No item with id '{0}'")]
    UnknownItem(String),
    #[error("Could not process image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input rejected locally, before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a name")]
    EmptyName,
    #[error("Please choose a category")]
    MissingCategory,
    #[error("Please enter a project title")]
    EmptyTitle,
    #[error("Please describe the project")]
    EmptyDescription,
    #[error("Images must be 5MB or smaller (got {size} bytes)")]
    ImageTooLarge { size: usize },
    #[error("'{0}' is not a date in YYYY-MM-DD format")]
    InvalidDate(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Self::Config(e.to_string())
    }
}
