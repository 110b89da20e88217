use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::repository::{
    models::{PortfolioFields, Student},
    remote::{Error, Request, Response, Result, Transport, decode_rows},
};

const STUDENTS: &str = "students";
const PORTFOLIOS: &str = "portfolios";
const CERTIFICATES: &str = "certificates";

/// How many students to scan when checking whether a name is already registered.
const ENSURE_SEARCH_LIMIT: u32 = 100;

/// Transport for the REST-like table API.
///
/// Each collection lives under `tables/<name>`. Lists accept `search`, `limit` and `sort` query
/// parameters and answer with `{"data": [...]}`; rows are created with `POST`, replaced with `PUT`
/// and removed with `DELETE` on `tables/<name>/<id>`. The `search` parameter is a fuzzy match, so
/// callers must not rely on it for scoping.
#[derive(Debug, Clone)]
pub struct TableTransport {
    http: reqwest::Client,
    base: Url,
}

impl TableTransport {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Protocol(format!("'{}' cannot be used as a base URL", self.base)))?
            .pop_if_empty()
            .push("tables")
            .extend(segments);

        Ok(url)
    }

    fn list_url(&self, table: &str, search: Option<&str>, limit: u32, newest_first: bool) -> Result<Url> {
        let mut url = self.url(&[table])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(search) = search {
                query.append_pair("search", search);
            }
            query.append_pair("limit", &limit.to_string());
            if newest_first {
                query.append_pair("sort", "-created_at");
            }
        }

        Ok(url)
    }

    /// Translate a request into the HTTP call that performs it.
    fn plan(&self, request: &Request) -> Result<TableCall> {
        let call = match request {
            Request::ListStudents { limit } => {
                TableCall::list(self.list_url(STUDENTS, None, *limit, false)?, Rows::Students)
            }
            Request::EnsureStudent { name } => TableCall::list(
                self.list_url(STUDENTS, Some(name.as_str()), ENSURE_SEARCH_LIMIT, false)?,
                Rows::Students,
            ),
            Request::ListPortfolios {
                student_name,
                limit,
            } => TableCall::list(
                self.list_url(PORTFOLIOS, Some(student_name.as_str()), *limit, true)?,
                Rows::Portfolios,
            ),
            Request::AdminListPortfolios { limit, .. } => TableCall::list(
                self.list_url(PORTFOLIOS, None, *limit, true)?,
                Rows::Portfolios,
            ),
            Request::CreatePortfolio(fields) => TableCall::write(
                Method::POST,
                self.url(&[PORTFOLIOS])?,
                Some(serde_json::to_value(PortfolioRow::from(fields))?),
            ),
            Request::UpdatePortfolio { id, fields } => TableCall::write(
                Method::PUT,
                self.url(&[PORTFOLIOS, id.as_str()])?,
                Some(serde_json::to_value(PortfolioRow::from(fields))?),
            ),
            Request::DeletePortfolio { id } | Request::AdminDeletePortfolio { id, .. } => {
                TableCall::write(Method::DELETE, self.url(&[PORTFOLIOS, id.as_str()])?, None)
            }
            Request::ListCertificates {
                student_name,
                limit,
            } => TableCall::list(
                self.list_url(CERTIFICATES, Some(student_name.as_str()), *limit, false)?,
                Rows::Certificates,
            ),
            Request::AdminListCertificates { limit, .. } => TableCall::list(
                self.list_url(CERTIFICATES, None, *limit, false)?,
                Rows::Certificates,
            ),
            Request::UpsertCertificate(record) => TableCall::write(
                Method::POST,
                self.url(&[CERTIFICATES])?,
                Some(serde_json::to_value(record)?),
            ),
            Request::DeleteCertificate { id } => {
                TableCall::write(Method::DELETE, self.url(&[CERTIFICATES, id.as_str()])?, None)
            }
            Request::UploadImage { .. } | Request::AdminLogin { .. } | Request::AdminExport { .. } => {
                return Err(Error::Unsupported(request.operation()));
            }
        };

        Ok(call)
    }

    async fn send(&self, call: TableCall) -> Result<Response> {
        debug!("{} {}", call.method, call.url);

        let mut builder = self.http.request(call.method, call.url);
        if let Some(body) = &call.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        interpret(status, &body, call.rows)
    }

    async fn ensure_student(&self, name: &str) -> Result<Response> {
        let lookup = self.plan(&Request::EnsureStudent {
            name: name.to_string(),
        })?;
        let existing = self.send(lookup).await?.into_students()?;

        match registration(&existing, name) {
            None => Ok(Response::Done),
            Some(student) => {
                let create = TableCall::write(
                    Method::POST,
                    self.url(&[STUDENTS])?,
                    Some(serde_json::to_value(student)?),
                );
                self.send(create).await
            }
        }
    }
}

/// Turn the status and body of a table API response into a [`Response`].
fn interpret(status: StatusCode, body: &str, rows: Option<Rows>) -> Result<Response> {
    if !status.is_success() {
        return Err(Error::Server(format!("{status} {}", body.trim())));
    }

    match rows {
        None => Ok(Response::Done),
        Some(rows) => {
            let page: Page = serde_json::from_str(body)?;
            Ok(rows.decode(page.data))
        }
    }
}

/// The row to create for `name`, unless `search` already found it. `search` is fuzzy, so only
/// an exact match counts.
fn registration(search: &[Student], name: &str) -> Option<Student> {
    if search.iter().any(|s| s.name == name) {
        None
    } else {
        Some(Student {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Transport for TableTransport {
    async fn call(&self, request: Request) -> Result<Response> {
        match &request {
            Request::EnsureStudent { name } => self.ensure_student(name).await,
            _ => {
                let call = self.plan(&request)?;
                self.send(call).await
            }
        }
    }
}

#[derive(Debug)]
struct TableCall {
    method: Method,
    url: Url,
    body: Option<Value>,
    /// Row type of the `data` array, or `None` when the body is ignored
    rows: Option<Rows>,
}

impl TableCall {
    fn list(url: Url, rows: Rows) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
            rows: Some(rows),
        }
    }

    fn write(method: Method, url: Url, body: Option<Value>) -> Self {
        Self {
            method,
            url,
            body,
            rows: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rows {
    Students,
    Portfolios,
    Certificates,
}

impl Rows {
    fn decode(self, data: Vec<Value>) -> Response {
        match self {
            Self::Students => Response::Students(decode_rows(data)),
            Self::Portfolios => Response::Portfolios(decode_rows(data)),
            Self::Certificates => Response::Certificates(decode_rows(data)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<Value>,
}

/// The table store names the image column `image_data`.
#[derive(Debug, Serialize)]
struct PortfolioRow<'a> {
    student_name: &'a str,
    category: &'a str,
    title: &'a str,
    description: &'a str,
    image_data: &'a str,
}

impl<'a> From<&'a PortfolioFields> for PortfolioRow<'a> {
    fn from(fields: &'a PortfolioFields) -> Self {
        Self {
            student_name: &fields.student_name,
            category: &fields.category,
            title: &fields.title,
            description: &fields.description,
            image_data: fields.image.as_str(),
        }
    }
}
