//! Request trust & error-formatting layer for Axum services.
//!
//! - [`trust`]: derive the client IP from proxy headers under an explicit
//!   trust policy
//! - [`validation`]: validate bound parameters against declarative
//!   constraints, naming fields by their serialization tags
//! - [`http`]: classify errors and render them as JSON, XML or plain text
//!   per the client's `Accept` header

pub mod config;
pub mod http;
pub mod observability;
pub mod trust;
pub mod validation;

pub use config::AppConfig;
pub use http::{AppError, HttpError, HttpServer};
pub use trust::{ClientIp, TrustConfig};
pub use validation::{Validate, Validator};
