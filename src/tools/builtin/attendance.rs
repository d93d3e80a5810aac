//! Student-portal attendance lookup, bound to the caller's portal session.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::ensure_success;
use crate::config::PortalSettings;
use crate::error::{AgentError, Result};
use crate::tools::{Capability, FieldSpec, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const NAME: &str = "attendance";

pub fn descriptor(settings: &PortalSettings) -> ToolDescriptor {
    let known = settings.semesters.keys().cloned().collect::<Vec<_>>().join(", ");
    ToolDescriptor::new(
        NAME,
        "Look up the student's attendance per subject from the college web portal.",
    )
    .action("fetch attendance")
    .field(FieldSpec::string(
        "semester",
        &format!(
            "Semester code ({}). Defaults to {}.",
            known, settings.default_semester
        ),
    ))
}

/// Credentials pulled out of a portal login response.
#[derive(Clone, PartialEq)]
pub struct PortalSession {
    token: String,
    member_id: String,
    client_id: String,
    institute_id: String,
}

impl std::fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalSession")
            .field("member_id", &self.member_id)
            .field("institute_id", &self.institute_id)
            .finish_non_exhaustive()
    }
}

fn text_at<'a>(value: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .find_map(|p| value.pointer(p).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

impl PortalSession {
    /// Accepts the login response as returned by the portal, optionally wrapped
    /// in `session_payload` and/or `raw_response`.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let mut payload = payload;
        for wrapper in ["session_payload", "raw_response"] {
            if let Some(inner) = payload.get(wrapper).filter(|v| v.is_object()) {
                payload = inner;
            }
        }

        let missing =
            |field: &str| AgentError::InvalidInput(format!("portal session has no {}", field));

        Ok(Self {
            token: text_at(payload, &["/regdata/token", "/token"])
                .ok_or_else(|| missing("token"))?
                .to_string(),
            member_id: text_at(payload, &["/regdata/memberid", "/memberid", "/member_id"])
                .ok_or_else(|| missing("memberid"))?
                .to_string(),
            client_id: text_at(payload, &["/regdata/clientid", "/clientid", "/client_id"])
                .unwrap_or("JAYPEE")
                .to_string(),
            institute_id: text_at(
                payload,
                &[
                    "/regdata/institutelist/0/value",
                    "/instituteid",
                    "/institute_id",
                ],
            )
            .ok_or_else(|| missing("instituteid"))?
            .to_string(),
        })
    }
}

/// One subject row as reported to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAttendance {
    #[serde(rename = "LTpercantage")]
    pub percentage: Value,
    #[serde(rename = "subjectcode")]
    pub subject: String,
    #[serde(rename = "subjectcode_code")]
    pub code: String,
}

pub struct Attendance {
    http: reqwest::Client,
    api_base: String,
    semesters: BTreeMap<String, String>,
    default_semester: String,
    session: Value,
    code_suffix: Regex,
}

impl Attendance {
    /// Bind the tool to a session payload. The payload is only parsed on use.
    pub fn new(http: reqwest::Client, settings: &PortalSettings, session: Value) -> Self {
        Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            semesters: settings.semesters.clone(),
            default_semester: settings.default_semester.clone(),
            session,
            code_suffix: Regex::new(r"\s*\(([^)]*)\)\s*$").expect("Invalid regex"),
        }
    }

    fn resolve_semester(&self, requested: Option<&str>) -> Result<(String, String)> {
        let code = requested
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.default_semester.clone());

        match self.semesters.get(&code) {
            Some(id) => Ok((code, id.clone())),
            None => Err(AgentError::InvalidInput(format!(
                "unknown semester '{}'; known semesters: {}",
                code,
                self.semesters.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Split "Data Structures (15B11CI111)" into name and code.
    pub fn split_subject(&self, raw: &str) -> (String, String) {
        match self.code_suffix.captures(raw) {
            Some(caps) => {
                let code = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                let name = self.code_suffix.replace(raw, "");
                (name.trim().to_string(), code.to_string())
            }
            None => (raw.trim().to_string(), String::new()),
        }
    }

    #[instrument(skip(self, session))]
    async fn fetch(
        &self,
        session: &PortalSession,
        code: &str,
        registration_id: &str,
    ) -> Result<Vec<SubjectAttendance>> {
        let response = self
            .http
            .post(format!(
                "{}/StudentClassAttendance/getstudentattendancedetail",
                self.api_base
            ))
            .bearer_auth(&session.token)
            .json(&json!({
                "clientid": session.client_id,
                "instituteid": session.institute_id,
                "studentid": session.member_id,
                "registrationcode": code,
                "registrationid": registration_id,
            }))
            .send()
            .await?;
        let body: Value = ensure_success(response, "Student portal").await?.json().await?;

        let list = body
            .pointer("/response/studentattendancelist")
            .or_else(|| body.get("studentattendancelist"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        debug!("Portal returned {} subject(s)", list.len());

        Ok(list
            .iter()
            .map(|item| {
                let raw = item["subjectcode"].as_str().unwrap_or_default();
                let (subject, code) = self.split_subject(raw);
                SubjectAttendance {
                    percentage: item.get("LTpercantage").cloned().unwrap_or(Value::Null),
                    subject,
                    code,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Capability for Attendance {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let (code, registration_id) = self.resolve_semester(args.str("semester"))?;
        let session = PortalSession::from_payload(&self.session)?;

        let rows = self.fetch(&session, &code, &registration_id).await?;
        if rows.is_empty() {
            return Ok(format!("No attendance records found for {}.", code).into());
        }
        Ok(ToolOutput::Structured(json!({
            "semester": code,
            "subjects": rows,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Value {
        json!({
            "raw_response": {
                "regdata": {
                    "token": "portal-token",
                    "memberid": "M1",
                    "clientid": "JAYPEE",
                    "institutelist": [{"label": "JIIT", "value": "I1"}]
                }
            }
        })
    }

    fn tool(base: &str) -> Attendance {
        let settings = PortalSettings {
            api_base: base.to_string(),
            ..PortalSettings::default()
        };
        Attendance::new(reqwest::Client::new(), &settings, session())
    }

    fn args(value: Value) -> ValidatedArgs {
        descriptor(&PortalSettings::default())
            .input_schema
            .validate(&value)
            .unwrap()
    }

    #[test]
    fn test_session_parsing() {
        let parsed = PortalSession::from_payload(&session()).unwrap();
        assert_eq!(parsed.member_id, "M1");
        assert_eq!(parsed.institute_id, "I1");

        let flat = json!({"token": "t", "memberid": "m", "instituteid": "i"});
        assert_eq!(PortalSession::from_payload(&flat).unwrap().client_id, "JAYPEE");

        let err = PortalSession::from_payload(&json!({"memberid": "m"})).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_session_debug_hides_token() {
        let parsed = PortalSession::from_payload(&session()).unwrap();
        assert!(!format!("{:?}", parsed).contains("portal-token"));
    }

    #[test]
    fn test_split_subject() {
        let tool = tool("http://unused");
        assert_eq!(
            tool.split_subject("Data Structures (15B11CI111)"),
            ("Data Structures".to_string(), "15B11CI111".to_string())
        );
        assert_eq!(
            tool.split_subject("Seminar"),
            ("Seminar".to_string(), String::new())
        );
    }

    #[test]
    fn test_semester_resolution() {
        let tool = tool("http://unused");
        assert_eq!(tool.resolve_semester(None).unwrap().0, "2025ODDSEM");
        assert_eq!(
            tool.resolve_semester(Some("2024evesem")).unwrap(),
            ("2024EVESEM".to_string(), "JIRUM23110000001".to_string())
        );
        let err = tool.resolve_semester(Some("2030ODDSEM")).unwrap_err();
        assert!(err.to_string().contains("2022ODDSEM"));
    }

    #[tokio::test]
    async fn test_attendance_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/StudentClassAttendance/getstudentattendancedetail"))
            .and(header("authorization", "Bearer portal-token"))
            .and(body_partial_json(json!({
                "registrationcode": "2025ODDSEM",
                "registrationid": "JIRUM25030000001",
                "studentid": "M1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"studentattendancelist": [
                    {"subjectcode": "Algorithms (15B11CI411)", "LTpercantage": 87.5}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = tool(&server.uri()).invoke(args(json!({}))).await.unwrap();
        let ToolOutput::Structured(value) = output else {
            panic!("expected structured output");
        };
        assert_eq!(value["semester"], "2025ODDSEM");
        assert_eq!(value["subjects"][0]["subjectcode"], "Algorithms");
        assert_eq!(value["subjects"][0]["subjectcode_code"], "15B11CI411");
        assert_eq!(value["subjects"][0]["LTpercantage"], 87.5);
    }

    #[tokio::test]
    async fn test_unknown_semester_makes_no_request() {
        let server = MockServer::start().await;
        let err = tool(&server.uri())
            .invoke(args(json!({"semester": "1999ODDSEM"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown semester"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
