use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::repository::{
    models::{ExportKind, NewCertificate, PortfolioFields},
    remote::{Error, Request, Response, Result, Transport, decode_rows},
};

/// Transport for the single-endpoint RPC store.
///
/// Every operation is a `POST` of `{"action": ..., ...payload}` to the same URL. The store answers
/// with an envelope `{"ok": bool, ...}`; `ok: false` carries the reason in `message` or `error`.
/// Some deployments answer list actions with a bare JSON array, and return every row regardless
/// of the student asked for.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl RpcTransport {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Transport for RpcTransport {
    async fn call(&self, request: Request) -> Result<Response> {
        let body = encode(&request)?;
        debug!("POST {} ({})", self.endpoint, request.operation());

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Server(format!("{status} {}", text.trim())));
        }

        let body: Value = response.json().await?;
        decode(&request, body)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum Action<'a> {
    ListStudents {
        limit: u32,
    },
    AddStudent {
        name: &'a str,
    },
    GetPortfolios {
        student_name: &'a str,
        limit: u32,
    },
    AddPortfolio(&'a PortfolioFields),
    UpdatePortfolio {
        id: &'a str,
        #[serde(flatten)]
        fields: &'a PortfolioFields,
    },
    DeletePortfolio {
        id: &'a str,
    },
    UploadImage {
        student_name: &'a str,
        data_uri: &'a str,
    },
    GetCertificates {
        student_name: &'a str,
        limit: u32,
    },
    UpsertCertificate(&'a NewCertificate),
    DeleteCertificate {
        id: &'a str,
    },
    AdminLogin {
        password: &'a str,
    },
    AdminPortfolios {
        token: &'a str,
        limit: u32,
    },
    AdminCertificates {
        token: &'a str,
        limit: u32,
    },
    AdminDeletePortfolio {
        token: &'a str,
        id: &'a str,
    },
    AdminExport {
        token: &'a str,
        kind: ExportKind,
    },
}

impl<'a> From<&'a Request> for Action<'a> {
    fn from(request: &'a Request) -> Self {
        match request {
            Request::ListStudents { limit } => Self::ListStudents { limit: *limit },
            Request::EnsureStudent { name } => Self::AddStudent { name },
            Request::ListPortfolios {
                student_name,
                limit,
            } => Self::GetPortfolios {
                student_name,
                limit: *limit,
            },
            Request::CreatePortfolio(fields) => Self::AddPortfolio(fields),
            Request::UpdatePortfolio { id, fields } => Self::UpdatePortfolio { id, fields },
            Request::DeletePortfolio { id } => Self::DeletePortfolio { id },
            Request::UploadImage {
                student_name,
                data_uri,
            } => Self::UploadImage {
                student_name,
                data_uri,
            },
            Request::ListCertificates {
                student_name,
                limit,
            } => Self::GetCertificates {
                student_name,
                limit: *limit,
            },
            Request::UpsertCertificate(record) => Self::UpsertCertificate(record),
            Request::DeleteCertificate { id } => Self::DeleteCertificate { id },
            Request::AdminLogin { password } => Self::AdminLogin { password },
            Request::AdminListPortfolios { token, limit } => Self::AdminPortfolios {
                token,
                limit: *limit,
            },
            Request::AdminListCertificates { token, limit } => Self::AdminCertificates {
                token,
                limit: *limit,
            },
            Request::AdminDeletePortfolio { token, id } => {
                Self::AdminDeletePortfolio { token, id }
            }
            Request::AdminExport { token, kind } => Self::AdminExport { token, kind: *kind },
        }
    }
}

fn encode(request: &Request) -> Result<Value> {
    Ok(serde_json::to_value(Action::from(request))?)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: Option<bool>,
    message: Option<String>,
    error: Option<Value>,
    students: Option<Vec<Value>>,
    portfolios: Option<Vec<Value>>,
    certificates: Option<Vec<Value>>,
    token: Option<String>,
    url: Option<String>,
    csv_base64: Option<String>,
}

impl Envelope {
    fn failure_message(self) -> String {
        self.message
            .or_else(|| match self.error {
                Some(Value::String(s)) => Some(s),
                Some(Value::Object(mut map)) => match map.remove("message") {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                },
                _ => None,
            })
            .unwrap_or_else(|| "request failed".to_string())
    }
}

fn missing(field: &str) -> Error {
    Error::Protocol(format!("response has no '{field}'"))
}

/// Translate the store's answer into the response the request expects.
fn decode(request: &Request, body: Value) -> Result<Response> {
    let envelope = match body {
        // Bare arrays are only ever list results
        Value::Array(rows) => {
            return match request {
                Request::ListStudents { .. } => Ok(Response::Students(decode_rows(rows))),
                Request::ListPortfolios { .. } | Request::AdminListPortfolios { .. } => {
                    Ok(Response::Portfolios(decode_rows(rows)))
                }
                Request::ListCertificates { .. } | Request::AdminListCertificates { .. } => {
                    Ok(Response::Certificates(decode_rows(rows)))
                }
                _ => Err(Error::Protocol(format!(
                    "unexpected list in response to {}",
                    request.operation()
                ))),
            };
        }
        other => serde_json::from_value::<Envelope>(other)?,
    };

    match envelope.ok {
        None => return Err(missing("ok")),
        Some(false) => return Err(Error::Server(envelope.failure_message())),
        Some(true) => {}
    }

    let response = match request {
        Request::ListStudents { .. } => {
            Response::Students(decode_rows(envelope.students.ok_or_else(|| missing("students"))?))
        }
        Request::ListPortfolios { .. } | Request::AdminListPortfolios { .. } => {
            Response::Portfolios(decode_rows(
                envelope.portfolios.ok_or_else(|| missing("portfolios"))?,
            ))
        }
        Request::ListCertificates { .. } | Request::AdminListCertificates { .. } => {
            Response::Certificates(decode_rows(
                envelope
                    .certificates
                    .ok_or_else(|| missing("certificates"))?,
            ))
        }
        Request::UploadImage { .. } => {
            Response::ImageUrl(envelope.url.ok_or_else(|| missing("url"))?)
        }
        Request::AdminLogin { .. } => {
            Response::Token(envelope.token.ok_or_else(|| missing("token"))?)
        }
        Request::AdminExport { .. } => {
            Response::Export(envelope.csv_base64.ok_or_else(|| missing("csv_base64"))?)
        }
        Request::EnsureStudent { .. }
        | Request::CreatePortfolio(_)
        | Request::UpdatePortfolio { .. }
        | Request::DeletePortfolio { .. }
        | Request::UpsertCertificate(_)
        | Request::DeleteCertificate { .. }
        | Request::AdminDeletePortfolio { .. } => Response::Done,
    };

    Ok(response)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::repository::models::{Certificate, ImagePayload};

    #[test]
    fn test_encode_flattens_payload() {
        let request = Request::UpdatePortfolio {
            id: "p1".into(),
            fields: PortfolioFields {
                student_name: "Kim".into(),
                category: "IoT".into(),
                title: "Smart plant".into(),
                description: "Soil sensor".into(),
                image: ImagePayload::Empty,
            },
        };

        assert_eq!(
            encode(&request).unwrap(),
            json!({
                "action": "updatePortfolio",
                "id": "p1",
                "student_name": "Kim",
                "category": "IoT",
                "title": "Smart plant",
                "description": "Soil sensor",
                "image": "",
            })
        );
    }

    #[test]
    fn test_encode_action_names() {
        let ensure = encode(&Request::EnsureStudent {
            name: "Kim".into(),
        })
        .unwrap();
        assert_eq!(ensure, json!({"action": "addStudent", "name": "Kim"}));

        let upsert = encode(&Request::UpsertCertificate(NewCertificate::obtained(
            "Kim",
            Certificate::Itq,
            "2026-03-15",
        )))
        .unwrap();
        assert_eq!(upsert["action"], "upsertCertificate");
        assert_eq!(upsert["cert_name"], "ITQ");

        let export = encode(&Request::AdminExport {
            token: "t".into(),
            kind: ExportKind::Certificates,
        })
        .unwrap();
        assert_eq!(
            export,
            json!({"action": "adminExport", "token": "t", "kind": "certificates"})
        );
    }

    #[test]
    fn test_failure_envelope() {
        let request = Request::DeletePortfolio { id: "p1".into() };

        let err = decode(&request, json!({"ok": false, "message": "row not found"})).unwrap_err();
        assert!(matches!(err, Error::Server(ref m) if m == "row not found"));

        let err = decode(&request, json!({"ok": false, "error": {"message": "locked"}})).unwrap_err();
        assert!(matches!(err, Error::Server(ref m) if m == "locked"));

        let err = decode(&request, json!({"ok": false})).unwrap_err();
        assert!(matches!(err, Error::Server(ref m) if m == "request failed"));
    }

    #[test]
    fn test_missing_ok() {
        let request = Request::DeletePortfolio { id: "p1".into() };

        assert!(matches!(
            decode(&request, json!({"deleted": true})),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_bare_array_list() {
        let request = Request::ListPortfolios {
            student_name: "Kim".into(),
            limit: 100,
        };
        let body = json!([
            {"id": "p1", "student": "Kim", "title": "A", "description": "a", "image": ""},
            {"id": "p2", "student": "Lee", "title": "B", "description": "b", "image": ""},
        ]);

        let items = decode(&request, body).unwrap().into_portfolios().unwrap();
        // Scoping is left to the caller
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_typed_results() {
        let login = decode(
            &Request::AdminLogin {
                password: "pw".into(),
            },
            json!({"ok": true, "token": "abc"}),
        )
        .unwrap();
        assert_eq!(login, Response::Token("abc".into()));

        let missing_token = decode(
            &Request::AdminLogin {
                password: "pw".into(),
            },
            json!({"ok": true}),
        );
        assert!(matches!(missing_token, Err(Error::Protocol(_))));
    }
}
