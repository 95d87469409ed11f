//! Parameter binding with validation.
//!
//! `Bound<T>` deserializes `T` from the query string or the body, then runs
//! the shared [`Validator`] on it. Binding failures are HTTP errors carrying
//! the framework's rejection status; validation failures are
//! [`AppError::Validation`].

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequest, Query, Request},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::http::error::{AppError, HttpError};
use crate::validation::{Validate, Validator};

/// Bound and validated request parameters.
#[derive(Debug, Clone)]
pub struct Bound<T>(pub T);

enum Source {
    Query,
    Json,
    Form,
}

fn source_of(req: &Request) -> Result<Source, AppError> {
    let method = req.method();
    if *method == Method::GET || *method == Method::HEAD || *method == Method::DELETE {
        return Ok(Source::Query);
    }

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase());

    match content_type.as_deref() {
        None => Ok(Source::Query),
        Some(ct) if ct.starts_with("application/json") => Ok(Source::Json),
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => Ok(Source::Form),
        Some(_) => Err(HttpError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type",
        )
        .into()),
    }
}

impl<S, T> FromRequest<S> for Bound<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Arc<Validator>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match source_of(&req)? {
            Source::Query => Query::<T>::try_from_uri(req.uri())?.0,
            Source::Json => Json::<T>::from_request(req, state).await?.0,
            Source::Form => Form::<T>::from_request(req, state).await?.0,
        };

        Arc::<Validator>::from_ref(state).validate(&value)?;
        Ok(Bound(value))
    }
}
