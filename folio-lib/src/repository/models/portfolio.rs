use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category filter sentinel that matches every item.
pub const ALL_CATEGORIES: &str = "all";

/// A project in a student's portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub id: String,
    #[serde(alias = "student")]
    pub student_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "image_data")]
    pub image: ImagePayload,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PortfolioItem {
    pub fn has_image(&self) -> bool {
        self.image.is_present()
    }
}

/// The user editable part of a [`PortfolioItem`]. Updates always replace all of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioFields {
    pub student_name: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub image: ImagePayload,
}

/// Image attached to a portfolio item.
///
/// Stored remotely as a single string: either an inline `data:` URI or the URL the store assigned
/// after an upload. An empty string means no image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum ImagePayload {
    #[default]
    Empty,
    Inline(String),
    Hosted(String),
}

impl ImagePayload {
    pub fn is_present(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Inline(_) => true,
            Self::Hosted(url) => !url.is_empty(),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Inline(data) => data,
            Self::Hosted(url) => url,
        }
    }
}

impl From<Option<String>> for ImagePayload {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Self::Empty,
            Some(s) if s.is_empty() => Self::Empty,
            Some(s) if s.starts_with("data:") => Self::Inline(s),
            Some(s) => Self::Hosted(s),
        }
    }
}

impl From<ImagePayload> for String {
    fn from(value: ImagePayload) -> Self {
        match value {
            ImagePayload::Empty => String::new(),
            ImagePayload::Inline(s) | ImagePayload::Hosted(s) => s,
        }
    }
}

/// `created_at` arrives as epoch milliseconds from the table store and as RFC 3339 text from the
/// RPC store. Anything else is treated as missing.
mod timestamp {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::IgnoredAny};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        FractionalMillis(f64),
        Text(String),
        Other(IgnoredAny),
    }

    /// Spreadsheet backends hand out milliseconds as floats, sometimes with a fraction.
    fn from_fractional_millis(ms: f64) -> Option<DateTime<Utc>> {
        let nanos = Duration::try_from_secs_f64(ms.abs() / 1000.0).ok()?.as_nanos();
        // Nearest millisecond
        let millis = i64::try_from(nanos.checked_add(500_000)?.checked_div(1_000_000)?).ok()?;

        DateTime::from_timestamp_millis(if ms.is_sign_negative() {
            millis.checked_neg()?
        } else {
            millis
        })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(raw.and_then(|raw| match raw {
            Raw::Millis(ms) => DateTime::from_timestamp_millis(ms),
            Raw::FractionalMillis(ms) => from_fractional_millis(ms),
            Raw::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| s.parse().ok().and_then(DateTime::from_timestamp_millis))
                .or_else(|| s.parse().ok().and_then(from_fractional_millis)),
            Raw::Other(_) => None,
        }))
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_some(&t.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }
}
