//! Demo handlers.
//!
//! `POST /` and `POST /{path}` bind [`EchoParams`], validate them and echo
//! them back. `str=err` returns an opaque error and `str=interr` a server
//! error wrapping an internal cause.

use axum::{
    extract::{rejection::PathRejection, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::bind::Bound;
use crate::http::error::{server_error, AppError, HttpError};
use crate::trust::ClientIp;
use crate::validation::{FieldSpec, FieldValue, Validate};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EchoParams {
    #[serde(default)]
    pub str: String,

    #[serde(default)]
    pub int: i64,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub form: String,

    #[serde(default)]
    pub query: String,
}

impl Validate for EchoParams {
    fn schema() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::new("str"),
            FieldSpec::new("int"),
            FieldSpec::new("email").json("email").rules("required,email"),
            FieldSpec::new("form").form("form"),
            FieldSpec::new("query").form("-").query("query"),
        ];
        FIELDS
    }

    fn field(&self, ident: &str) -> FieldValue<'_> {
        match ident {
            "str" => (&self.str).into(),
            "int" => self.int.into(),
            "email" => (&self.email).into(),
            "form" => (&self.form).into(),
            "query" => (&self.query).into(),
            _ => FieldValue::Missing,
        }
    }
}

pub async fn echo_root(
    ClientIp(ip): ClientIp,
    Bound(params): Bound<EchoParams>,
) -> Result<Json<Value>, AppError> {
    echo(ip.to_string(), None, params)
}

pub async fn echo_path(
    ClientIp(ip): ClientIp,
    path: Result<Path<String>, PathRejection>,
    Bound(params): Bound<EchoParams>,
) -> Result<Json<Value>, AppError> {
    let Path(path) = path?;
    echo(ip.to_string(), Some(path), params)
}

fn echo(ip: String, path: Option<String>, params: EchoParams) -> Result<Json<Value>, AppError> {
    match params.str.as_str() {
        "err" => return Err(AppError::opaque("common error returned")),
        "interr" => {
            return Err(server_error(
                "Some server error happened, sorry.",
                "internal technical error details",
            )
            .into())
        }
        _ => {}
    }

    Ok(Json(json!({
        "ok": "good!",
        "ip": ip,
        "path": path,
        "params": params,
    })))
}

/// Fallback for unmatched paths.
pub async fn not_found() -> AppError {
    HttpError::new(StatusCode::NOT_FOUND, "Not Found").into()
}

/// Fallback for matched paths with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    HttpError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into()
}
