use async_trait::async_trait;
use base64::{Engine, engine::general_purpose};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::repository::{
    models::{CertificateRecord, ExportKind, PortfolioFields, PortfolioItem, Student},
    remote::{Error, Request, Response, Result, Transport},
};

/// First `created_at` handed out, in epoch milliseconds. Each new row is one second newer.
const EPOCH_MS: i64 = 1_767_225_600_000;
const ADMIN_TOKEN: &str = "memory-admin-token";

/// Failure injected into every call until cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Network,
    Server(String),
}

/// An in-process store holding the three collections in memory.
///
/// Lists come back in insertion order (oldest first) and `limit` is applied after scoping, the way
/// a naive spreadsheet backend behaves. With [`MemoryTransport::unscoped`] the per-student lists
/// ignore the student entirely. Every call is recorded so tests can check what reached the store.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    students: Vec<Student>,
    portfolios: Vec<PortfolioItem>,
    certificates: Vec<CertificateRecord>,
    next_id: i64,
    calls: Vec<&'static str>,
    unscoped: bool,
    append_only: bool,
    failure: Option<Failure>,
    admin_password: Option<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose per-student lists return every row.
    pub fn unscoped() -> Self {
        let transport = Self::default();
        transport.state.lock().unscoped = true;
        transport
    }

    /// A store where every certificate upsert adds a new row, like a backend that can only POST.
    pub fn append_only() -> Self {
        let transport = Self::default();
        transport.state.lock().append_only = true;
        transport
    }

    pub fn with_admin_password(self, password: &str) -> Self {
        self.state.lock().admin_password = Some(password.to_string());
        self
    }

    /// Make every following call fail, or stop failing with `None`.
    pub fn set_failure(&self, failure: Option<Failure>) {
        self.state.lock().failure = failure;
    }

    /// Operation names of every call received so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn students(&self) -> Vec<Student> {
        self.state.lock().students.clone()
    }

    pub fn portfolios(&self) -> Vec<PortfolioItem> {
        self.state.lock().portfolios.clone()
    }

    pub fn certificates(&self) -> Vec<CertificateRecord> {
        self.state.lock().certificates.clone()
    }

    /// Insert a portfolio row directly, bypassing the call log. Returns its id.
    pub fn seed_portfolio(&self, fields: PortfolioFields) -> String {
        self.state.lock().create_portfolio(fields)
    }

    /// Insert a certificate row directly, bypassing the call log.
    pub fn seed_certificate(&self, record: CertificateRecord) {
        self.state.lock().certificates.push(record);
    }
}

impl State {
    fn next_id(&mut self, prefix: &str) -> (String, Option<DateTime<Utc>>) {
        let seq = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        let created_at = DateTime::from_timestamp_millis(EPOCH_MS.saturating_add(seq.saturating_mul(1000)));

        (format!("{prefix}{seq}"), created_at)
    }

    fn create_portfolio(&mut self, fields: PortfolioFields) -> String {
        let (id, created_at) = self.next_id("p");
        self.portfolios.push(PortfolioItem {
            id: id.clone(),
            student_name: fields.student_name,
            category: fields.category,
            title: fields.title,
            description: fields.description,
            image: fields.image,
            created_at,
        });

        id
    }

    fn check_admin(&self, token: &str) -> Result<()> {
        if self.admin_password.is_some() && token == ADMIN_TOKEN {
            Ok(())
        } else {
            Err(Error::Server("Not authorized".into()))
        }
    }

    fn handle(&mut self, request: Request) -> Result<Response> {
        let response = match request {
            Request::ListStudents { limit } => {
                Response::Students(self.students.iter().take(limit_of(limit)).cloned().collect())
            }
            Request::EnsureStudent { name } => {
                if !self.students.iter().any(|s| s.name == name) {
                    self.students.push(Student { name });
                }
                Response::Done
            }
            Request::ListPortfolios {
                student_name,
                limit,
            } => {
                let unscoped = self.unscoped;
                Response::Portfolios(
                    self.portfolios
                        .iter()
                        .filter(|p| unscoped || p.student_name == student_name)
                        .take(limit_of(limit))
                        .cloned()
                        .collect(),
                )
            }
            Request::CreatePortfolio(fields) => {
                self.create_portfolio(fields);
                Response::Done
            }
            Request::UpdatePortfolio { id, fields } => {
                let item = self
                    .portfolios
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| Error::Server(format!("No portfolio '{id}'")))?;
                item.category = fields.category;
                item.title = fields.title;
                item.description = fields.description;
                item.image = fields.image;
                Response::Done
            }
            Request::DeletePortfolio { id } => {
                self.portfolios.retain(|p| p.id != id);
                Response::Done
            }
            Request::UploadImage { student_name, .. } => {
                let (id, _) = self.next_id("img");
                Response::ImageUrl(format!("memory://images/{student_name}/{id}.jpg"))
            }
            Request::ListCertificates {
                student_name,
                limit,
            } => {
                let unscoped = self.unscoped;
                Response::Certificates(
                    self.certificates
                        .iter()
                        .filter(|c| unscoped || c.student_name == student_name)
                        .take(limit_of(limit))
                        .cloned()
                        .collect(),
                )
            }
            Request::UpsertCertificate(new) => {
                let existing = if self.append_only {
                    None
                } else {
                    self.certificates.iter_mut().find(|c| {
                        c.student_name == new.student_name && c.cert_name == new.cert_name
                    })
                };
                if let Some(existing) = existing {
                    existing.obtained = new.obtained;
                    existing.obtained_date = new.obtained_date;
                } else {
                    let (id, _) = self.next_id("c");
                    self.certificates.push(CertificateRecord {
                        id,
                        student_name: new.student_name,
                        cert_name: new.cert_name,
                        obtained: new.obtained,
                        obtained_date: new.obtained_date,
                    });
                }
                Response::Done
            }
            Request::DeleteCertificate { id } => {
                self.certificates.retain(|c| c.id != id);
                Response::Done
            }
            Request::AdminLogin { password } => match &self.admin_password {
                Some(expected) if *expected == password => Response::Token(ADMIN_TOKEN.into()),
                _ => return Err(Error::Server("Wrong password".into())),
            },
            Request::AdminListPortfolios { token, limit } => {
                self.check_admin(&token)?;
                Response::Portfolios(self.portfolios.iter().take(limit_of(limit)).cloned().collect())
            }
            Request::AdminListCertificates { token, limit } => {
                self.check_admin(&token)?;
                Response::Certificates(
                    self.certificates.iter().take(limit_of(limit)).cloned().collect(),
                )
            }
            Request::AdminDeletePortfolio { token, id } => {
                self.check_admin(&token)?;
                self.portfolios.retain(|p| p.id != id);
                Response::Done
            }
            Request::AdminExport { token, kind } => {
                self.check_admin(&token)?;
                Response::Export(general_purpose::STANDARD.encode(self.export(kind)))
            }
        };

        Ok(response)
    }

    fn export(&self, kind: ExportKind) -> String {
        let rows: Vec<Vec<&str>> = match kind {
            ExportKind::Portfolios => self
                .portfolios
                .iter()
                .map(|p| {
                    vec![
                        p.student_name.as_str(),
                        p.category.as_str(),
                        p.title.as_str(),
                        p.description.as_str(),
                    ]
                })
                .collect(),
            ExportKind::Certificates => self
                .certificates
                .iter()
                .map(|c| {
                    vec![
                        c.student_name.as_str(),
                        c.cert_name.as_str(),
                        c.obtained_date.as_str(),
                    ]
                })
                .collect(),
        };
        let header = match kind {
            ExportKind::Portfolios => "student_name,category,title,description",
            ExportKind::Certificates => "student_name,cert_name,obtained_date",
        };

        let mut csv = String::from(header);
        for row in rows {
            csv.push('\n');
            csv.push_str(
                &row.iter()
                    .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        csv
    }
}

fn limit_of(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn call(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock();
        state.calls.push(request.operation());

        if let Some(failure) = state.failure.clone() {
            return Err(match failure {
                Failure::Network => Error::Network("connection refused".into()),
                Failure::Server(message) => Error::Server(message),
            });
        }

        state.handle(request)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::repository::models::ImagePayload;

    fn fields(student: &str, title: &str) -> PortfolioFields {
        PortfolioFields {
            student_name: student.into(),
            category: "IoT".into(),
            title: title.into(),
            description: "desc".into(),
            image: ImagePayload::Empty,
        }
    }

    #[tokio::test]
    async fn test_scoped_lists() {
        let store = MemoryTransport::new();
        store.seed_portfolio(fields("Kim", "A"));
        store.seed_portfolio(fields("Lee", "B"));

        let items = store
            .call(Request::ListPortfolios {
                student_name: "Kim".into(),
                limit: 100,
            })
            .await
            .unwrap()
            .into_portfolios()
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(store.calls(), vec!["portfolios.listByStudent"]);
    }

    #[tokio::test]
    async fn test_unscoped_lists() {
        let store = MemoryTransport::unscoped();
        store.seed_portfolio(fields("Kim", "A"));
        store.seed_portfolio(fields("Lee", "B"));

        let items = store
            .call(Request::ListPortfolios {
                student_name: "Kim".into(),
                limit: 100,
            })
            .await
            .unwrap()
            .into_portfolios()
            .unwrap();

        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_student_is_idempotent() {
        let store = MemoryTransport::new();

        for name in ["Kim", "Kim", "kim"] {
            store
                .call(Request::EnsureStudent { name: name.into() })
                .await
                .unwrap();
        }

        assert_eq!(store.students().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryTransport::new();
        store.set_failure(Some(Failure::Server("quota exceeded".into())));

        let err = store
            .call(Request::ListStudents { limit: 10 })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Server(ref m) if m == "quota exceeded"));
    }
}
