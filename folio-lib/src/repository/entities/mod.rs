//! Stateful components built on top of the remote client.
//!
//! Each keeps a local cache of what it last fetched and refreshes that cache with a full reload
//! after every successful write. Nothing is patched in place.

mod admin;
mod certificates;
mod identity;
mod image;
mod portfolios;

pub use admin::{Admin, AdminDashboard};
pub use certificates::{CertificateStatus, Certificates, Progress};
pub use identity::Identity;
pub use self::image::{MAX_HEIGHT, MAX_UPLOAD_BYTES, MAX_WIDTH, fit_within, inline_jpeg};
pub use portfolios::{Draft, Portfolios};

/// Result of an operation that asks for confirmation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user said no; nothing was sent
    Declined,
}
