//! Structured error payloads in the style of RFC 9457.
//!
//! A [`Problem`] is built on demand for every failed request and rendered exactly once by
//! [`render`], which negotiates between `application/problem+json` and `text/plain`.

use crate::body::ResponseBody;
use crate::negotiate::negotiate;
use crate::validate::Violations;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use mime::Mime;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::warn;

pub const ABOUT_BLANK: &str = "about:blank";

static APPLICATION_PROBLEM_JSON: Lazy<Mime> =
    Lazy::new(|| "application/problem+json".parse().unwrap_or(mime::APPLICATION_JSON));

static PROBLEM_MEDIA_TYPES: Lazy<[Mime; 3]> =
    Lazy::new(|| [APPLICATION_PROBLEM_JSON.clone(), mime::APPLICATION_JSON, mime::TEXT_PLAIN_UTF_8]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default = "about_blank")]
    type_uri: String,
    title: String,
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    extensions: Map<String, Value>,
}

fn about_blank() -> String {
    ABOUT_BLANK.to_string()
}

impl Problem {
    /// A problem of type `about:blank` titled after the status' canonical reason.
    pub fn new(status: StatusCode) -> Self {
        Self {
            type_uri: about_blank(),
            title: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            errors: None,
            extensions: Map::new(),
        }
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.type_uri = type_uri.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Attaches per-field messages; repeated fields have their messages joined with `"; "`.
    pub fn with_errors(mut self, violations: &Violations) -> Self {
        let errors = self.errors.get_or_insert_with(BTreeMap::new);
        for violation in violations {
            errors
                .entry(violation.field().to_string())
                .and_modify(|message| {
                    message.push_str("; ");
                    message.push_str(violation.message());
                })
                .or_insert_with(|| violation.message().to_string());
        }
        self
    }

    /// Adds an extension member. Names colliding with the standard members are ignored.
    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if matches!(name.as_str(), "type" | "title" | "status" | "detail" | "instance" | "errors") {
            warn!(name = %name, "ignore problem extension shadowing a standard member");
            return self;
        }
        self.extensions.insert(name, value.into());
        self
    }

    pub fn type_uri(&self) -> &str {
        &self.type_uri
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn errors(&self) -> Option<&BTreeMap<String, String>> {
        self.errors.as_ref()
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }

    /// Plain text form, used when the client only accepts `text/plain`.
    pub fn to_text(&self) -> String {
        let mut text = format!("{} {}", self.status, self.title);
        if let Some(detail) = &self.detail {
            let _ = write!(text, ": {detail}");
        }
        if let Some(instance) = &self.instance {
            let _ = write!(text, " ({instance})");
        }
        for (field, message) in self.errors.iter().flatten() {
            let _ = write!(text, "\n{field}: {message}");
        }
        text
    }
}

/// Renders `problem` for a client whose `Accept` header is `accept`.
///
/// JSON based choices produce `application/problem+json`; if the client accepts none of the
/// problem representations the JSON form is sent anyway.
pub fn render(problem: &Problem, accept: Option<&str>) -> Response<ResponseBody> {
    let chosen = negotiate(accept, PROBLEM_MEDIA_TYPES.as_slice()).unwrap_or(&PROBLEM_MEDIA_TYPES[0]);

    let (content_type, body) = if chosen.type_() == mime::TEXT {
        (HeaderValue::from_static("text/plain; charset=utf-8"), ResponseBody::from(problem.to_text()))
    } else {
        match serde_json::to_vec(problem) {
            Ok(json) => (HeaderValue::from_static("application/problem+json"), ResponseBody::from(bytes::Bytes::from(json))),
            Err(e) => {
                warn!(cause = %e, "failed to serialize problem, fallback to text");
                (HeaderValue::from_static("text/plain; charset=utf-8"), ResponseBody::from(problem.to_text()))
            }
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = problem.status_code();
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

#[cfg(test)]
mod tests {
    use super::{render, Problem};
    use crate::validate::Violations;
    use http::header::CONTENT_TYPE;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;

    #[test]
    fn defaults_from_status() {
        let problem = Problem::new(StatusCode::NOT_FOUND);
        assert_eq!(problem.type_uri(), "about:blank");
        assert_eq!(problem.title(), "Not Found");
        assert_eq!(problem.status(), 404);
        assert!(problem.detail().is_none());
    }

    #[test]
    fn wire_format() {
        let mut violations = Violations::new();
        violations.push("name", "must not be empty").push("age", "must be positive");

        let problem = Problem::new(StatusCode::UNPROCESSABLE_ENTITY)
            .with_detail("request failed validation")
            .with_instance("/pets")
            .with_errors(&violations);

        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "about:blank",
                "title": "Unprocessable Entity",
                "status": 422,
                "detail": "request failed validation",
                "instance": "/pets",
                "errors": { "name": "must not be empty", "age": "must be positive" }
            })
        );
    }

    #[test]
    fn errors_member_absent_without_violations() {
        let value = serde_json::to_value(Problem::new(StatusCode::BAD_REQUEST)).unwrap();
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn repeated_fields_are_joined() {
        let mut violations = Violations::new();
        violations.push("name", "too short").push("name", "must be lowercase");
        let problem = Problem::new(StatusCode::UNPROCESSABLE_ENTITY).with_errors(&violations);
        assert_eq!(problem.errors().unwrap()["name"], "too short; must be lowercase");
    }

    #[test]
    fn extensions_are_flattened() {
        let problem = Problem::new(StatusCode::FORBIDDEN)
            .with_type("https://example.com/probs/out-of-credit")
            .with_extension("balance", 30)
            .with_extension("status", 200);

        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(value["balance"], 30);
        assert_eq!(value["status"], 403);
        assert_eq!(value["type"], "https://example.com/probs/out-of-credit");

        let parsed: Problem = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, problem);
    }

    #[tokio::test]
    async fn render_json_by_default() {
        let problem = Problem::new(StatusCode::NOT_ACCEPTABLE).with_detail("nope");
        let response = render(&problem, None);

        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/problem+json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Problem = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, problem);
    }

    #[tokio::test]
    async fn render_text_when_asked() {
        let problem = Problem::new(StatusCode::NOT_FOUND).with_detail("no such pet").with_instance("/pets/9");
        let response = render(&problem, Some("text/plain"));

        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "404 Not Found: no such pet (/pets/9)");
    }

    #[test]
    fn render_json_when_nothing_acceptable() {
        let response = render(&Problem::new(StatusCode::BAD_REQUEST), Some("image/png"));
        assert_eq!(response.headers()[CONTENT_TYPE], "application/problem+json");
    }
}
