//! Error classification and negotiated error responses.
//!
//! # Responsibilities
//! - Classify handler, binding and validation errors into status + message
//! - Render the message as JSON, XML or plain text per the `Accept` header
//! - Log wrapped internal causes without sending them to the client
//!
//! # Design Decisions
//! - `AppError` is a closed enum; classification is an exhaustive match
//! - Validation failures keep status 500 (not 400); downstream clients
//!   depending on the current behaviour see no change
//! - Only the first failing field is reported
//! - Handlers return `AppError`; `error_responder` renders it once the
//!   request's method and `Accept` header are known

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::http::negotiate::{negotiate_headers, Format};
use crate::http::request::RequestMeta;
use crate::observability::metrics;
use crate::validation::{ValidateError, ValidationErrors};

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error carrying an explicit HTTP status and client-facing message.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    internal: Option<BoxError>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            internal: None,
        }
    }

    /// Attach a cause that is logged but never shown to the client.
    pub fn with_internal(mut self, internal: impl Into<BoxError>) -> Self {
        self.internal = Some(internal.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn internal(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.internal.as_deref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, message={}", self.status.as_u16(), self.message)?;
        if let Some(internal) = &self.internal {
            write!(f, ", internal={}", internal)?;
        }
        Ok(())
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.internal
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// A 500 error with a client-facing message and an internal cause.
pub fn server_error(message: impl Into<String>, internal: impl Into<BoxError>) -> HttpError {
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, message).with_internal(internal)
}

/// Any error raised while handling a request.
#[derive(Debug, Error)]
pub enum AppError {
    /// Explicit status and message.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Declared constraints failed.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Anything else; its `Display` text becomes the message.
    #[error("{0}")]
    Opaque(BoxError),
}

impl AppError {
    pub fn opaque(err: impl Into<BoxError>) -> Self {
        AppError::Opaque(err.into())
    }

    /// Derive the status code, message and internal cause.
    pub fn classify(self) -> ErrorReport {
        match self {
            AppError::Http(err) => ErrorReport {
                status: err.status,
                message: err.message,
                internal: err.internal.map(Arc::from),
            },
            AppError::Validation(errors) => {
                let message = match errors.first() {
                    Some(first) => format!(
                        "Field '{}' failed validation '{}'.",
                        first.field(),
                        first.tag()
                    ),
                    None => errors.to_string(),
                };
                ErrorReport::internal_server_error(message)
            }
            AppError::Opaque(err) => ErrorReport::internal_server_error(err.to_string()),
        }
    }
}

impl From<ValidateError> for AppError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Invalid(errors) => AppError::Validation(errors),
            ValidateError::Schema(err) => AppError::Opaque(Box::new(err)),
        }
    }
}

macro_rules! rejection_into_http_error {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for AppError {
                fn from(rejection: $rejection) -> Self {
                    AppError::Http(HttpError::new(rejection.status(), rejection.body_text()))
                }
            }
        )*
    };
}

rejection_into_http_error!(JsonRejection, FormRejection, PathRejection, QueryRejection);

/// A classified error awaiting rendering.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    internal: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ErrorReport {
    fn internal_server_error(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
            internal: None,
        }
    }

    pub fn internal(&self) -> Option<&(dyn StdError + Send + Sync)> {
        self.internal.as_deref()
    }

    /// Render the body in the given format.
    pub fn render(&self, format: Format) -> Response {
        match format {
            Format::Json => (self.status, Json(ErrorBody { error: &self.message })).into_response(),
            Format::Xml => (
                self.status,
                [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
                format!("<error message=\"{}\"></error>", escape_attr(&self.message)),
            )
                .into_response(),
            Format::Text => (self.status, format!("Error: {}\n", self.message)).into_response(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

impl IntoResponse for AppError {
    /// Renders JSON and attaches the report so `error_responder` can
    /// re-render it for the actual request.
    fn into_response(self) -> Response {
        let report = self.classify();
        let mut response = report.render(Format::Json);
        response.extensions_mut().insert(report);
        response
    }
}

/// Write the final response for a classified error.
///
/// HEAD requests get the status with an empty body. The internal cause,
/// if any, is logged here and only here.
pub fn respond(report: ErrorReport, meta: &RequestMeta) -> Response {
    let format = negotiate_headers(&meta.headers);
    let response = if meta.method == Method::HEAD {
        report.status.into_response()
    } else {
        report.render(format)
    };

    metrics::record_error(report.status.as_u16(), format.as_str());

    if let Some(internal) = report.internal() {
        tracing::error!(
            request_id = meta.request_id.as_deref().unwrap_or("unknown"),
            method = %meta.method,
            path = %meta.path,
            status = report.status.as_u16(),
            error = %internal,
            "Request failed with internal error"
        );
    }

    response
}

/// Middleware rendering pending error reports.
///
/// Responses without a report were produced by the handler itself and pass
/// through untouched.
pub async fn error_responder(req: Request<Body>, next: Next) -> Response {
    let meta = RequestMeta::from_request(&req);
    let mut response = next.run(req).await;

    match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => respond(report, &meta),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{FieldSpec, FieldValue, Validate, Validator};
    use axum::http::HeaderMap;
    use tracing_test::traced_test;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn meta(method: Method, accept: Option<&str>) -> RequestMeta {
        let mut headers = HeaderMap::new();
        if let Some(accept) = accept {
            headers.insert(header::ACCEPT, accept.parse().unwrap());
        }
        RequestMeta {
            method,
            path: "/".into(),
            headers,
            request_id: Some("test-request".into()),
        }
    }

    struct Contact {
        email: String,
        phone: String,
    }

    impl Validate for Contact {
        fn schema() -> &'static [FieldSpec] {
            const FIELDS: &[FieldSpec] = &[
                FieldSpec::new("Email").json("email").rules("required,email"),
                FieldSpec::new("Phone").form("phone").rules("required,numeric"),
            ];
            FIELDS
        }

        fn field(&self, ident: &str) -> FieldValue<'_> {
            match ident {
                "Email" => (&self.email).into(),
                "Phone" => (&self.phone).into(),
                _ => FieldValue::Missing,
            }
        }
    }

    fn validation_error() -> AppError {
        let record = Contact {
            email: String::new(),
            phone: "abc".into(),
        };
        Validator::new().validate(&record).unwrap_err().into()
    }

    #[test]
    fn test_classify_http_error() {
        let report = AppError::from(HttpError::new(StatusCode::BAD_REQUEST, "bad request")).classify();
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert_eq!(report.message, "bad request");
        assert!(report.internal().is_none());
    }

    #[test]
    fn test_classify_validation_reports_first_field_with_500() {
        let report = validation_error().classify();
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(report.message, "Field 'email' failed validation 'required'.");
    }

    #[test]
    fn test_classify_empty_validation_set_is_opaque() {
        let report = AppError::Validation(ValidationErrors::default()).classify();
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(report.message, "");
    }

    #[test]
    fn test_classify_opaque() {
        let report = AppError::opaque("common error returned").classify();
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(report.message, "common error returned");
    }

    #[test]
    fn test_schema_error_is_opaque() {
        let err = AppError::from(ValidateError::Schema(crate::validation::SchemaError {
            record: "Contact",
            field: "Email",
            source: crate::validation::RuleError::Unknown("shiny".into()),
        }));
        assert!(matches!(err, AppError::Opaque(_)));
    }

    #[test]
    fn test_http_error_display_includes_internal() {
        let err = server_error("oops", "disk full");
        assert_eq!(err.to_string(), "code=500, message=oops, internal=disk full");
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_json_body() {
        let report = AppError::from(HttpError::new(StatusCode::BAD_REQUEST, "bad request")).classify();
        let response = respond(report, &meta(Method::GET, Some("application/json")));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"error":"bad request"}"#);
    }

    #[tokio::test]
    async fn test_xml_body_escapes_attribute() {
        let report = AppError::opaque(r#"a "quoted" <tag> & more"#).classify();
        let response = respond(report, &meta(Method::POST, Some("text/xml")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(response).await,
            "<error message=\"a &#34;quoted&#34; &lt;tag&gt; &amp; more\"></error>"
        );
    }

    #[tokio::test]
    async fn test_text_body() {
        let response = respond(validation_error().classify(), &meta(Method::POST, Some("text/html")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(
            body_string(response).await,
            "Error: Field 'email' failed validation 'required'.\n"
        );
    }

    #[tokio::test]
    async fn test_head_has_empty_body() {
        for accept in [Some("application/json"), Some("application/xml"), None] {
            let report = AppError::from(HttpError::new(StatusCode::NOT_FOUND, "Not Found")).classify();
            let response = respond(report, &meta(Method::HEAD, accept));
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert!(body_string(response).await.is_empty());
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_internal_cause_logged_once_never_sent() {
        for accept in ["application/json", "application/xml", "text/plain"] {
            let err = server_error("Something went wrong", "pg pool exhausted on replica-7");
            let response = respond(AppError::from(err).classify(), &meta(Method::GET, Some(accept)));
            let body = body_string(response).await;
            assert!(!body.contains("replica-7"), "leaked cause under {accept}: {body}");
            assert!(body.contains("Something went wrong"));
        }

        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("pg pool exhausted on replica-7")).count() {
                3 => Ok(()),
                n => Err(format!("expected one log line per request, found {n}")),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_no_log_without_internal_cause() {
        let response = respond(
            AppError::opaque("plain failure").classify(),
            &meta(Method::GET, Some("application/json")),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!logs_contain("Request failed with internal error"));
    }

    #[tokio::test]
    async fn test_into_response_attaches_report() {
        let response = AppError::opaque("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "boom");
    }
}
