//! Validation engine.
//!
//! # Responsibilities
//! - Compile each record type's field schema once (names + rules)
//! - Run every constraint of every field against a bound record
//! - Report failures with externally visible field names
//!
//! # Design Decisions
//! - Schemas are compiled at registration and cached per type
//! - One failure is reported per field: the first constraint it violates
//! - Malformed declarations are startup errors, not request errors

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::validation::naming::{resolve_field_name, FieldTags};
use crate::validation::rules::{parse_rules, FieldValue, Rule, RuleError};

/// Static description of one field of a bound record.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub ident: &'static str,
    pub tags: FieldTags<'static>,
    pub rules: &'static str,
}

impl FieldSpec {
    pub const fn new(ident: &'static str) -> Self {
        Self {
            ident,
            tags: FieldTags::none(),
            rules: "",
        }
    }

    pub const fn json(mut self, tag: &'static str) -> Self {
        self.tags.json = Some(tag);
        self
    }

    pub const fn form(mut self, tag: &'static str) -> Self {
        self.tags.form = Some(tag);
        self
    }

    pub const fn query(mut self, tag: &'static str) -> Self {
        self.tags.query = Some(tag);
        self
    }

    pub const fn rules(mut self, rules: &'static str) -> Self {
        self.rules = rules;
        self
    }
}

/// A record whose fields carry declarative constraints.
///
/// ```ignore
/// impl Validate for Signup {
///     fn schema() -> &'static [FieldSpec] {
///         const FIELDS: &[FieldSpec] = &[
///             FieldSpec::new("email").json("email").rules("required,email"),
///         ];
///         FIELDS
///     }
///
///     fn field(&self, ident: &str) -> FieldValue<'_> {
///         match ident {
///             "email" => (&self.email).into(),
///             _ => FieldValue::Missing,
///         }
///     }
/// }
/// ```
pub trait Validate: 'static {
    fn schema() -> &'static [FieldSpec];

    /// Value of the field declared as `ident` in [`Validate::schema`].
    fn field(&self, ident: &str) -> FieldValue<'_>;
}

/// A malformed constraint declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{record}.{field}: {source}")]
pub struct SchemaError {
    pub record: &'static str,
    pub field: &'static str,
    #[source]
    pub source: RuleError,
}

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    namespace: String,
    field: String,
    struct_field: &'static str,
    tag: &'static str,
    param: Option<String>,
}

impl FieldError {
    /// Externally visible field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Rust identifier of the field.
    pub fn struct_field(&self) -> &'static str {
        self.struct_field
    }

    /// Identifier of the failed constraint, e.g. `required`.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key: '{}' Error:Field validation for '{}' failed on the '{}' tag",
            self.namespace, self.field, self.tag
        )
    }
}

/// All failing fields of one record, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    pub fn first(&self) -> Option<&FieldError> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result of validating a record.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug)]
struct CompiledField {
    ident: &'static str,
    name: String,
    rules: Vec<Rule>,
}

#[derive(Debug)]
struct CompiledSchema {
    record: &'static str,
    fields: Vec<CompiledField>,
}

impl CompiledSchema {
    fn compile<T: Validate>() -> Result<Self, SchemaError> {
        let record = short_type_name::<T>();
        let fields = T::schema()
            .iter()
            .map(|spec| -> Result<CompiledField, SchemaError> {
                let rules = parse_rules(spec.rules).map_err(|source| SchemaError {
                    record,
                    field: spec.ident,
                    source,
                })?;
                let name = resolve_field_name(&spec.tags).unwrap_or(spec.ident);
                Ok(CompiledField {
                    ident: spec.ident,
                    name: name.to_string(),
                    rules,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { record, fields })
    }

    fn check<T: Validate>(&self, record: &T) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for field in &self.fields {
            let value = record.field(field.ident);
            for rule in &field.rules {
                if *rule == Rule::OmitEmpty {
                    if value.is_zero() {
                        break;
                    }
                    continue;
                }
                if !rule.check(&value) {
                    errors.push(FieldError {
                        namespace: format!("{}.{}", self.record, field.name),
                        field: field.name.clone(),
                        struct_field: field.ident,
                        tag: rule.tag(),
                        param: rule.param(),
                    });
                    break;
                }
            }
        }
        errors
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Declarative-constraint validator with a per-type schema cache.
#[derive(Debug, Default)]
pub struct Validator {
    schemas: DashMap<TypeId, Arc<CompiledSchema>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and cache the schema of `T`, surfacing malformed declarations.
    pub fn register<T: Validate>(&self) -> Result<(), SchemaError> {
        self.schema::<T>().map(|_| ())
    }

    /// Builder form of [`Validator::register`].
    pub fn with<T: Validate>(self) -> Result<Self, SchemaError> {
        self.register::<T>()?;
        Ok(self)
    }

    /// Run every constraint of `record`.
    pub fn validate<T: Validate>(&self, record: &T) -> Result<(), ValidateError> {
        let schema = self.schema::<T>()?;
        let errors = schema.check(record);
        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                record = schema.record,
                failures = errors.len(),
                "Validation failed"
            );
            Err(ValidationErrors(errors).into())
        }
    }

    fn schema<T: Validate>(&self) -> Result<Arc<CompiledSchema>, SchemaError> {
        let id = TypeId::of::<T>();
        if let Some(schema) = self.schemas.get(&id) {
            return Ok(Arc::clone(schema.value()));
        }

        let schema = Arc::new(CompiledSchema::compile::<T>()?);
        self.schemas.insert(id, Arc::clone(&schema));
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Signup {
        email: String,
        nickname: Option<String>,
        age: i64,
        tags: Vec<String>,
    }

    impl Validate for Signup {
        fn schema() -> &'static [FieldSpec] {
            const FIELDS: &[FieldSpec] = &[
                FieldSpec::new("email").json("email").rules("required,email"),
                FieldSpec::new("nickname")
                    .json("-")
                    .form("nick,omitempty")
                    .rules("omitempty,min=3"),
                FieldSpec::new("age").query("age").rules("min=18"),
                FieldSpec::new("tags").rules("max=2"),
            ];
            FIELDS
        }

        fn field(&self, ident: &str) -> FieldValue<'_> {
            match ident {
                "email" => (&self.email).into(),
                "nickname" => (&self.nickname).into(),
                "age" => self.age.into(),
                "tags" => (&self.tags).into(),
                _ => FieldValue::Missing,
            }
        }
    }

    fn valid() -> Signup {
        Signup {
            email: "test@gmail.com".into(),
            nickname: None,
            age: 30,
            tags: vec![],
        }
    }

    struct Broken;

    impl Validate for Broken {
        fn schema() -> &'static [FieldSpec] {
            const FIELDS: &[FieldSpec] = &[FieldSpec::new("name").rules("required,shiny")];
            FIELDS
        }

        fn field(&self, _ident: &str) -> FieldValue<'_> {
            FieldValue::Missing
        }
    }

    #[test]
    fn test_valid_record() {
        let validator = Validator::new().with::<Signup>().unwrap();
        assert!(validator.validate(&valid()).is_ok());
    }

    #[test]
    fn test_reports_resolved_names_and_tags() {
        let validator = Validator::new();
        let record = Signup {
            email: String::new(),
            nickname: Some("ab".into()),
            age: 12,
            tags: vec!["a".into(), "b".into(), "c".into()],
        };

        let Err(ValidateError::Invalid(errors)) = validator.validate(&record) else {
            panic!("expected validation errors");
        };
        let got: Vec<(&str, &str)> = errors.iter().map(|e| (e.field(), e.tag())).collect();
        assert_eq!(
            got,
            vec![("email", "required"), ("nick", "min"), ("age", "min"), ("tags", "max")]
        );
        assert_eq!(errors.first().unwrap().struct_field(), "email");
        assert_eq!(errors.iter().nth(2).unwrap().param(), Some("18"));
    }

    #[test]
    fn test_first_failing_rule_per_field() {
        let validator = Validator::new();
        let record = Signup {
            email: "nope".into(),
            ..valid()
        };
        let Err(ValidateError::Invalid(errors)) = validator.validate(&record) else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().tag(), "email");
    }

    #[test]
    fn test_omitempty_skips_zero_values() {
        let validator = Validator::new();
        let record = Signup {
            nickname: Some(String::new()),
            ..valid()
        };
        assert!(validator.validate(&record).is_ok());
    }

    #[test]
    fn test_display_matches_key_format() {
        let validator = Validator::new();
        let record = Signup {
            email: String::new(),
            ..valid()
        };
        let err = validator.validate(&record).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Key: 'Signup.email' Error:Field validation for 'email' failed on the 'required' tag"
        );
    }

    #[test]
    fn test_malformed_schema_is_reported() {
        let validator = Validator::new();
        let err = validator.register::<Broken>().unwrap_err();
        assert_eq!(err.record, "Broken");
        assert_eq!(err.field, "name");
        assert_eq!(err.source, RuleError::Unknown("shiny".into()));

        assert!(matches!(validator.validate(&Broken), Err(ValidateError::Schema(_))));
    }
}
