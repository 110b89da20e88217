//! Everything that talks to the remote store.
//!
//! Callers build a typed [`Request`], hand it to the [`Client`], and get back a typed
//! [`Response`]. The wire format lives entirely in the [`Transport`] implementations, of which
//! there are three: the REST-like [`TableTransport`], the single endpoint [`RpcTransport`] and the
//! in-process [`MemoryTransport`].
//!
//! Transports are not trusted to scope results by student. Components always filter the rows they
//! get back by owner name themselves.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::repository::models::{
    CertificateRecord, ExportKind, NewCertificate, PortfolioFields, PortfolioItem, Student,
};

mod cancel;
mod client;
mod memory;
mod rpc;
mod table;

pub use cancel::CancelToken;
pub use client::Client;
pub use memory::{Failure, MemoryTransport};
pub use rpc::RpcTransport;
pub use table::TableTransport;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not reach the server: {0}")]
    Network(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Unexpected response from the server: {0}")]
    Protocol(String),
    #[error("The server took too long to respond")]
    Timeout,
    #[error("Request cancelled")]
    Cancelled,
    #[error("'{0}' is not supported by this backend")]
    Unsupported(&'static str),
}

impl Error {
    /// Failures worth a second attempt for idempotent requests
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Protocol(e.to_string())
        } else if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Every operation the remote store understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListStudents { limit: u32 },
    /// Create the student unless one with exactly this name exists
    EnsureStudent { name: String },
    ListPortfolios { student_name: String, limit: u32 },
    CreatePortfolio(PortfolioFields),
    UpdatePortfolio { id: String, fields: PortfolioFields },
    DeletePortfolio { id: String },
    /// Host an inline image and get back its URL
    UploadImage { student_name: String, data_uri: String },
    ListCertificates { student_name: String, limit: u32 },
    UpsertCertificate(NewCertificate),
    DeleteCertificate { id: String },
    AdminLogin { password: String },
    AdminListPortfolios { token: String, limit: u32 },
    AdminListCertificates { token: String, limit: u32 },
    AdminDeletePortfolio { token: String, id: String },
    AdminExport { token: String, kind: ExportKind },
}

impl Request {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ListStudents { .. } => "students.list",
            Self::EnsureStudent { .. } => "students.ensure",
            Self::ListPortfolios { .. } => "portfolios.listByStudent",
            Self::CreatePortfolio(_) => "portfolios.create",
            Self::UpdatePortfolio { .. } => "portfolios.update",
            Self::DeletePortfolio { .. } => "portfolios.delete",
            Self::UploadImage { .. } => "images.upload",
            Self::ListCertificates { .. } => "certs.listByStudent",
            Self::UpsertCertificate(_) => "certs.upsert",
            Self::DeleteCertificate { .. } => "certs.delete",
            Self::AdminLogin { .. } => "admin.login",
            Self::AdminListPortfolios { .. } => "admin.portfolios.list",
            Self::AdminListCertificates { .. } => "admin.certs.list",
            Self::AdminDeletePortfolio { .. } => "admin.portfolios.delete",
            Self::AdminExport { .. } => "admin.export",
        }
    }

    /// Reads have no side effects and may be retried.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ListStudents { .. }
                | Self::ListPortfolios { .. }
                | Self::ListCertificates { .. }
                | Self::AdminListPortfolios { .. }
                | Self::AdminListCertificates { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Done,
    Students(Vec<Student>),
    Portfolios(Vec<PortfolioItem>),
    Certificates(Vec<CertificateRecord>),
    Token(String),
    ImageUrl(String),
    /// Base64 encoded CSV
    Export(String),
}

impl Response {
    fn kind(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Students(_) => "students",
            Self::Portfolios(_) => "portfolios",
            Self::Certificates(_) => "certificates",
            Self::Token(_) => "token",
            Self::ImageUrl(_) => "image url",
            Self::Export(_) => "export",
        }
    }

    fn unexpected(self, expected: &str) -> Error {
        Error::Protocol(format!("expected {expected}, got {}", self.kind()))
    }

    pub fn into_done(self) -> Result<()> {
        match self {
            Self::Done => Ok(()),
            other => Err(other.unexpected("done")),
        }
    }

    pub fn into_students(self) -> Result<Vec<Student>> {
        match self {
            Self::Students(students) => Ok(students),
            other => Err(other.unexpected("students")),
        }
    }

    pub fn into_portfolios(self) -> Result<Vec<PortfolioItem>> {
        match self {
            Self::Portfolios(items) => Ok(items),
            other => Err(other.unexpected("portfolios")),
        }
    }

    pub fn into_certificates(self) -> Result<Vec<CertificateRecord>> {
        match self {
            Self::Certificates(records) => Ok(records),
            other => Err(other.unexpected("certificates")),
        }
    }

    pub fn into_token(self) -> Result<String> {
        match self {
            Self::Token(token) => Ok(token),
            other => Err(other.unexpected("token")),
        }
    }

    pub fn into_image_url(self) -> Result<String> {
        match self {
            Self::ImageUrl(url) => Ok(url),
            other => Err(other.unexpected("image url")),
        }
    }

    pub fn into_export(self) -> Result<String> {
        match self {
            Self::Export(csv_base64) => Ok(csv_base64),
            other => Err(other.unexpected("export")),
        }
    }
}

/// A way of reaching the remote store.
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    async fn call(&self, request: Request) -> Result<Response>;
}

/// Decode rows one by one, dropping the ones that don't fit instead of failing the whole list.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("Skipping malformed row: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reads() {
        assert!(Request::ListStudents { limit: 10 }.is_read());
        assert!(
            !Request::DeletePortfolio {
                id: "p1".into()
            }
            .is_read()
        );
        assert!(
            !Request::AdminLogin {
                password: "x".into()
            }
            .is_read()
        );
    }

    #[test]
    fn test_unexpected_response() {
        let err = Response::Done.into_portfolios().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
