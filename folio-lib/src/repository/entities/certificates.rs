use chrono::{Local, NaiveDate};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::{
    Error, Notice, Result, ValidationError,
    repository::{
        config::Cfg,
        entities::Identity,
        models::{CATALOG_SIZE, Certificate, CertificateRecord, NewCertificate},
        remote::{Client, Request, Response},
        session::SessionHandle,
    },
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where a student stands on one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStatus {
    pub certificate: Certificate,
    /// The stored record, if there is one
    pub record: Option<CertificateRecord>,
}

impl CertificateStatus {
    fn unobtained(certificate: Certificate) -> Self {
        Self {
            certificate,
            record: None,
        }
    }

    pub fn is_obtained(&self) -> bool {
        self.record.as_ref().is_some_and(|r| r.obtained)
    }

    pub fn obtained_date(&self) -> Option<&str> {
        self.record
            .as_ref()
            .filter(|r| r.obtained && !r.obtained_date.is_empty())
            .map(|r| r.obtained_date.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub obtained: usize,
    pub remaining: usize,
    /// Rounded to the nearest whole percent
    pub percentage: usize,
}

impl Progress {
    fn of(obtained: usize) -> Self {
        let obtained = obtained.min(CATALOG_SIZE);
        let percentage = (200 * obtained + CATALOG_SIZE)
            .checked_div(2 * CATALOG_SIZE)
            .unwrap_or(0);

        Self {
            obtained,
            remaining: CATALOG_SIZE - obtained,
            percentage,
        }
    }
}

/// Obtained and missing certificates of the student being viewed.
///
/// Holds one [`CertificateStatus`] per catalog entry, in catalog order, no matter what the store
/// returns.
#[derive(Debug, Clone)]
pub struct Certificates {
    client: Client,
    identity: Identity,
    session: SessionHandle,
    cfg: Cfg,
    statuses: Vec<CertificateStatus>,
    loaded_for: Option<String>,
}

impl Certificates {
    pub(crate) fn new(
        client: Client,
        identity: Identity,
        session: SessionHandle,
        cfg: Cfg,
    ) -> Self {
        Self {
            client,
            identity,
            session,
            cfg,
            statuses: Certificate::iter().map(CertificateStatus::unobtained).collect(),
            loaded_for: None,
        }
    }

    pub fn statuses(&self) -> &[CertificateStatus] {
        &self.statuses
    }

    pub fn status(&self, certificate: Certificate) -> Option<&CertificateStatus> {
        self.statuses.iter().find(|s| s.certificate == certificate)
    }

    pub fn progress(&self) -> Progress {
        Progress::of(self.statuses.iter().filter(|s| s.is_obtained()).count())
    }

    /// View the certificates of `name` and load them.
    pub async fn login(&mut self, name: &str) -> Result<Notice> {
        let name = self.identity.login_cert_viewer(name)?;
        self.load(&name).await;

        Ok(Notice::CertificatesLoaded(name))
    }

    pub fn logout(&mut self) -> Result<()> {
        self.identity.logout_cert_viewer()?;
        self.reset();

        Ok(())
    }

    /// Rebuild the statuses from the records of `owner`.
    ///
    /// Records of other students and names outside the catalog are ignored. When a certificate
    /// has several records an obtained one wins. If the store can't be read everything shows as
    /// not obtained.
    pub async fn load(&mut self, owner: &str) -> &[CertificateStatus] {
        let limit = self.cfg.read().remote.page_limit;

        let records = match self
            .client
            .call(Request::ListCertificates {
                student_name: owner.to_string(),
                limit,
            })
            .await
            .and_then(Response::into_certificates)
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not load certificates of '{owner}': {e}");
                Vec::new()
            }
        };

        self.statuses = Certificate::iter()
            .map(|certificate| CertificateStatus {
                certificate,
                record: record_for(&records, owner, certificate),
            })
            .collect();
        self.loaded_for = Some(owner.to_string());

        debug!(
            "'{owner}' has {} of {CATALOG_SIZE} certificates",
            self.progress().obtained
        );

        &self.statuses
    }

    /// [`Certificates::load`] for the current certificate viewer.
    pub async fn refresh(&mut self) -> Result<&[CertificateStatus]> {
        let owner = self.viewer()?;
        Ok(self.load(&owner).await)
    }

    /// Flip a certificate between obtained and not obtained.
    ///
    /// Marking it obtained records `date_input` when one is given, today's date otherwise.
    pub async fn toggle(
        &mut self,
        certificate: Certificate,
        date_input: Option<&str>,
    ) -> Result<Notice> {
        let owner = self.viewer()?;
        if self.loaded_for.as_deref() != Some(owner.as_str()) {
            debug!("Certificate statuses are not for '{owner}', reloading");
            self.load(&owner).await;
        }

        let record = self
            .status(certificate)
            .filter(|s| s.is_obtained())
            .and_then(|s| s.record.clone());

        let notice = match record {
            Some(record) => {
                self.client
                    .call(Request::DeleteCertificate { id: record.id })
                    .await?
                    .into_done()?;
                Notice::CertificateRevoked(certificate)
            }
            None => {
                let date = obtained_date(date_input)?;
                self.client
                    .call(Request::UpsertCertificate(NewCertificate::obtained(
                        &owner,
                        certificate,
                        &date,
                    )))
                    .await?
                    .into_done()?;
                Notice::CertificateObtained(certificate)
            }
        };

        self.load(&owner).await;

        Ok(notice)
    }

    fn viewer(&self) -> Result<String> {
        self.session
            .read()
            .current_cert_user()
            .map(str::to_string)
            .ok_or(Error::NotLoggedIn)
    }

    fn reset(&mut self) {
        self.statuses = Certificate::iter().map(CertificateStatus::unobtained).collect();
        self.loaded_for = None;
    }
}

/// The record of `owner` for `certificate`, preferring an obtained one over the rest.
fn record_for(
    records: &[CertificateRecord],
    owner: &str,
    certificate: Certificate,
) -> Option<CertificateRecord> {
    let mut matching = records.iter().filter(|r| {
        r.student_name == owner && r.cert_name.parse::<Certificate>() == Ok(certificate)
    });
    let first = matching.next()?;

    if first.obtained {
        return Some(first.clone());
    }
    Some(matching.find(|r| r.obtained).unwrap_or(first).clone())
}

/// The date to record: the given `YYYY-MM-DD` date, or today if none was entered.
fn obtained_date(input: Option<&str>) -> Result<String> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        Some(input) => NaiveDate::parse_from_str(input, DATE_FORMAT)
            .map(|date| date.format(DATE_FORMAT).to_string())
            .map_err(|_| Error::from(ValidationError::InvalidDate(input.to_string()))),
        None => Ok(Local::now().date_naive().format(DATE_FORMAT).to_string()),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        Repository,
        repository::remote::{Failure, MemoryTransport},
    };

    fn record(id: &str, student: &str, cert: &str) -> CertificateRecord {
        CertificateRecord {
            id: id.into(),
            student_name: student.into(),
            cert_name: cert.into(),
            obtained: true,
            obtained_date: "2026-03-15".into(),
        }
    }

    #[test]
    fn test_progress() {
        assert_eq!(
            Progress::of(0),
            Progress {
                obtained: 0,
                remaining: 7,
                percentage: 0
            }
        );
        assert_eq!(Progress::of(1).percentage, 14);
        assert_eq!(Progress::of(3).percentage, 43);
        assert_eq!(Progress::of(4).percentage, 57);
        assert_eq!(Progress::of(7).percentage, 100);
    }

    #[test]
    fn test_obtained_date() {
        assert_eq!(obtained_date(Some(" 2026-03-15 ")).unwrap(), "2026-03-15");
        assert!(matches!(
            obtained_date(Some("15/03/2026")),
            Err(Error::Validation(ValidationError::InvalidDate(_)))
        ));

        let today = obtained_date(Some("  ")).unwrap();
        assert!(NaiveDate::parse_from_str(&today, DATE_FORMAT).is_ok());
        assert_eq!(today.len(), 10);
    }

    #[tokio::test]
    async fn test_toggle_round_trip() {
        let store = Arc::new(MemoryTransport::new());
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();

        let notice = certificates
            .toggle(Certificate::Embedded, Some("2026-03-15"))
            .await
            .unwrap();

        assert_eq!(notice, Notice::CertificateObtained(Certificate::Embedded));
        assert_eq!(store.certificates().len(), 1);
        let status = certificates.status(Certificate::Embedded).unwrap();
        assert!(status.is_obtained());
        assert_eq!(status.obtained_date(), Some("2026-03-15"));
        assert_eq!(certificates.progress().obtained, 1);

        let notice = certificates.toggle(Certificate::Embedded, None).await.unwrap();

        assert_eq!(notice, Notice::CertificateRevoked(Certificate::Embedded));
        assert!(store.certificates().is_empty());
        assert!(!certificates.status(Certificate::Embedded).unwrap().is_obtained());
    }

    #[tokio::test]
    async fn test_toggle_defaults_to_today() {
        let store = Arc::new(MemoryTransport::new());
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();

        certificates.toggle(Certificate::Itq, None).await.unwrap();

        let today = Local::now().date_naive().format(DATE_FORMAT).to_string();
        assert_eq!(
            store.certificates().first().map(|c| c.obtained_date.clone()),
            Some(today)
        );
    }

    #[tokio::test]
    async fn test_invalid_date_makes_no_call() {
        let store = Arc::new(MemoryTransport::new());
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();
        let calls = store.calls().len();

        let err = certificates
            .toggle(Certificate::Itq, Some("yesterday"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::InvalidDate(_))));
        assert_eq!(store.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_extraneous_records_are_ignored() {
        let store = Arc::new(MemoryTransport::unscoped());
        store.seed_certificate(record("c1", "Kim", "ITQ"));
        store.seed_certificate(record("c2", "Kim", "ITQ"));
        store.seed_certificate(record("c3", "Kim", "정보처리기사"));
        store.seed_certificate(record("c4", "Lee", "전기기능사"));
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();

        let notice = certificates.login("Kim").await.unwrap();

        assert_eq!(notice, Notice::CertificatesLoaded("Kim".into()));
        assert_eq!(certificates.statuses().len(), CATALOG_SIZE);
        let itq = certificates.status(Certificate::Itq).unwrap();
        assert_eq!(itq.record.as_ref().map(|r| r.id.as_str()), Some("c1"));
        assert!(!certificates.status(Certificate::Electrical).unwrap().is_obtained());
        assert_eq!(
            certificates.progress(),
            Progress {
                obtained: 1,
                remaining: 6,
                percentage: 14
            }
        );
    }

    #[tokio::test]
    async fn test_unobtained_record_toggles_on() {
        let store = Arc::new(MemoryTransport::new());
        store.seed_certificate(CertificateRecord {
            obtained: false,
            ..record("c1", "Kim", "ITQ")
        });
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();
        assert!(!certificates.status(Certificate::Itq).unwrap().is_obtained());

        let notice = certificates.toggle(Certificate::Itq, None).await.unwrap();

        assert_eq!(notice, Notice::CertificateObtained(Certificate::Itq));
        assert!(certificates.status(Certificate::Itq).unwrap().is_obtained());
        assert_eq!(store.certificates().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_on_with_append_only_store() {
        let store = Arc::new(MemoryTransport::append_only());
        store.seed_certificate(CertificateRecord {
            obtained: false,
            ..record("unticked", "Kim", "ITQ")
        });
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();

        let notice = certificates.toggle(Certificate::Itq, None).await.unwrap();

        assert_eq!(notice, Notice::CertificateObtained(Certificate::Itq));
        assert_eq!(store.certificates().len(), 2);
        let itq = certificates.status(Certificate::Itq).unwrap();
        assert!(itq.is_obtained());
        assert_ne!(itq.record.as_ref().map(|r| r.id.as_str()), Some("unticked"));
        assert_eq!(certificates.progress().obtained, 1);

        let notice = certificates.toggle(Certificate::Itq, None).await.unwrap();

        assert_eq!(notice, Notice::CertificateRevoked(Certificate::Itq));
        assert!(!certificates.status(Certificate::Itq).unwrap().is_obtained());
    }

    #[test]
    fn test_obtained_record_wins() {
        let records = [
            CertificateRecord {
                obtained: false,
                ..record("c1", "Kim", "ITQ")
            },
            record("c2", "Lee", "ITQ"),
            record("c3", "Kim", "ITQ"),
            record("c4", "Kim", "ITQ"),
        ];

        let chosen = record_for(&records, "Kim", Certificate::Itq);
        assert_eq!(chosen.map(|r| r.id), Some("c3".to_string()));

        let unobtained = record_for(records.get(..2).unwrap(), "Kim", Certificate::Itq);
        assert_eq!(unobtained.map(|r| r.id), Some("c1".to_string()));
        assert_eq!(record_for(&records, "Park", Certificate::Itq), None);
    }

    #[tokio::test]
    async fn test_switching_viewer_toggles_for_new_viewer() {
        let store = Arc::new(MemoryTransport::new());
        store.seed_certificate(record("c1", "Kim", "ITQ"));
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();
        assert!(certificates.status(Certificate::Itq).unwrap().is_obtained());

        repo.identity().login_cert_viewer("Lee").unwrap();
        let notice = certificates.toggle(Certificate::Itq, None).await.unwrap();

        assert_eq!(notice, Notice::CertificateObtained(Certificate::Itq));
        let stored = store.certificates();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|c| c.id == "c1" && c.student_name == "Kim" && c.obtained));
        assert!(stored.iter().any(|c| c.student_name == "Lee" && c.obtained));
        assert!(certificates.status(Certificate::Itq).unwrap().is_obtained());
    }

    #[tokio::test]
    async fn test_read_failure_shows_nothing_obtained() {
        let store = Arc::new(MemoryTransport::new());
        store.seed_certificate(record("c1", "Kim", "ITQ"));
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        store.set_failure(Some(Failure::Network));

        certificates.login("Kim").await.unwrap();

        assert_eq!(certificates.progress().obtained, 0);
    }

    #[tokio::test]
    async fn test_toggle_requires_viewer() {
        let repo = Repository::mock();
        let mut certificates = repo.certificates();

        let err = certificates.toggle(Certificate::Itq, None).await.unwrap_err();

        assert!(matches!(err, Error::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_logout_resets() {
        let store = Arc::new(MemoryTransport::new());
        store.seed_certificate(record("c1", "Kim", "ITQ"));
        let repo = Repository::mock_with(store.clone());
        let mut certificates = repo.certificates();
        certificates.login("Kim").await.unwrap();
        assert_eq!(certificates.progress().obtained, 1);

        certificates.logout().unwrap();

        assert_eq!(certificates.progress().obtained, 0);
        assert_eq!(repo.session().current_cert_user(), None);
    }
}
