//! Records exchanged with the remote store.
//!
//! These mirror the rows of the store's collections. Field aliases cover the naming differences
//! between the table and RPC backends so a row reads the same regardless of where it came from.

mod certificate;
mod portfolio;
mod student;

pub use certificate::{CATALOG_SIZE, Certificate, CertificateRecord, NewCertificate};
pub use portfolio::{ALL_CATEGORIES, ImagePayload, PortfolioFields, PortfolioItem};
pub use student::Student;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What an administrator export should contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportKind {
    Portfolios,
    Certificates,
}
