use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumCount, EnumIter, EnumString};

/// Number of certificates tracked. Progress is always measured against this, never against what
/// the store returns.
pub const CATALOG_SIZE: usize = Certificate::COUNT;

/// The fixed catalog of certificates a student can earn.
///
/// The serialized form is the certificate's official title, which is what the store keeps in
/// `cert_name`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumCount, EnumIter, EnumString,
)]
pub enum Certificate {
    #[strum(serialize = "전자캐드기능사")]
    ElectronicCad,
    #[strum(serialize = "전자기능사")]
    Electronics,
    #[strum(serialize = "임베디드기능사")]
    Embedded,
    #[strum(serialize = "전기기능사")]
    Electrical,
    #[strum(serialize = "프로그래밍기능사")]
    Programming,
    #[strum(serialize = "컴퓨터활용능력")]
    ComputerLiteracy,
    #[strum(serialize = "ITQ")]
    Itq,
}

impl Certificate {
    pub fn description(&self) -> &'static str {
        match self {
            Self::ElectronicCad => "Electronic circuit CAD design",
            Self::Electronics => "Electronic components and basic circuit practice",
            Self::Embedded => "Embedded system development",
            Self::Electrical => "Electrical installation and maintenance",
            Self::Programming => "Software programming",
            Self::ComputerLiteracy => "Computer use and data processing",
            Self::Itq => "Information technology qualification (word processor, spreadsheet, slides)",
        }
    }
}

/// A stored certificate row. Its existence means the certificate was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: String,
    #[serde(alias = "student")]
    pub student_name: String,
    #[serde(alias = "cert")]
    pub cert_name: String,
    #[serde(default = "default_obtained")]
    pub obtained: bool,
    #[serde(default)]
    pub obtained_date: String,
}

fn default_obtained() -> bool {
    true
}

/// Payload for creating a [`CertificateRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCertificate {
    pub student_name: String,
    pub cert_name: String,
    pub obtained: bool,
    /// `YYYY-MM-DD`
    pub obtained_date: String,
}

impl NewCertificate {
    pub fn obtained(student_name: &str, cert: Certificate, date: &str) -> Self {
        Self {
            student_name: student_name.to_string(),
            cert_name: cert.to_string(),
            obtained: true,
            obtained_date: date.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_catalog() {
        assert_eq!(CATALOG_SIZE, 7);
        assert_eq!(Certificate::iter().count(), CATALOG_SIZE);
        assert_eq!(Certificate::Itq.to_string(), "ITQ");
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(
            Certificate::from_str("임베디드기능사").unwrap(),
            Certificate::Embedded
        );
        assert!(Certificate::from_str("itq").is_err());
    }
}
