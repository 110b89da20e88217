//! Short user-facing messages produced by successful operations.
//!
//! Failures are reported through [`crate::Error`], whose `Display` text doubles as the notice
//! shown to the user.

use derive_more::Display;

use crate::repository::models::Certificate;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Notice {
    #[display("Welcome, {_0}!")]
    Welcome(String),
    #[display("Loaded certificate status for {_0}")]
    CertificatesLoaded(String),
    #[display("Project saved")]
    PortfolioCreated,
    #[display("Project updated")]
    PortfolioUpdated,
    #[display("Project deleted")]
    PortfolioDeleted,
    #[display("Congratulations on earning {_0}!")]
    CertificateObtained(Certificate),
    #[display("{_0} marked as not obtained")]
    CertificateRevoked(Certificate),
    #[display("Administrator logged in")]
    AdminLoggedIn,
}
