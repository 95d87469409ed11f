//! Request parameter validation subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Validate::schema() (static field specs)
//!     → naming.rs (json > form > query > identifier)
//!     → rules.rs (parse "required,email" declarations)
//!     → engine.rs (compiled schema cached per type)
//!
//! Per request:
//!     bound record → Validator::validate → ValidationErrors
//! ```

pub mod engine;
pub mod naming;
pub mod rules;

pub use engine::{FieldError, FieldSpec, SchemaError, Validate, ValidateError, ValidationErrors, Validator};
pub use naming::{resolve_field_name, FieldTags};
pub use rules::{FieldValue, Rule, RuleError};
