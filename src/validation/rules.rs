//! Declarative constraints and the values they are checked against.
//!
//! Constraints are declared as a comma-separated list, e.g.
//! `"required,email"` or `"omitempty,min=3,max=32"`.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::trust::Cidr;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("valid regex literal")
});

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+(?:\.[0-9]+)?$").expect("valid regex literal"));

/// A value borrowed from a bound record for checking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A collection, by element count.
    List(usize),
    /// An absent optional value.
    Missing,
}

impl FieldValue<'_> {
    /// Zero values fail `required` and trigger `omitempty`.
    pub fn is_zero(&self) -> bool {
        match *self {
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::Int(n) => n == 0,
            FieldValue::Float(n) => n == 0.0,
            FieldValue::Bool(b) => !b,
            FieldValue::List(len) => len == 0,
            FieldValue::Missing => true,
        }
    }

    /// Size used by `min`, `max` and `len`.
    fn size(&self) -> Option<f64> {
        match *self {
            FieldValue::Str(s) => Some(s.chars().count() as f64),
            FieldValue::Int(n) => Some(n as f64),
            FieldValue::Float(n) => Some(n),
            FieldValue::List(len) => Some(len as f64),
            FieldValue::Bool(_) | FieldValue::Missing => None,
        }
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(s: &'a str) -> Self {
        FieldValue::Str(s)
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(s: &'a String) -> Self {
        FieldValue::Str(s)
    }
}

impl<'a> From<&'a Option<String>> for FieldValue<'a> {
    fn from(s: &'a Option<String>) -> Self {
        s.as_deref().map_or(FieldValue::Missing, FieldValue::Str)
    }
}

impl From<i64> for FieldValue<'_> {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<i32> for FieldValue<'_> {
    fn from(n: i32) -> Self {
        FieldValue::Int(n.into())
    }
}

impl From<u32> for FieldValue<'_> {
    fn from(n: u32) -> Self {
        FieldValue::Int(n.into())
    }
}

impl From<Option<i64>> for FieldValue<'_> {
    fn from(n: Option<i64>) -> Self {
        n.map_or(FieldValue::Missing, FieldValue::Int)
    }
}

impl From<f64> for FieldValue<'_> {
    fn from(n: f64) -> Self {
        FieldValue::Float(n)
    }
}

impl From<bool> for FieldValue<'_> {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<'a, T> From<&'a Vec<T>> for FieldValue<'a> {
    fn from(v: &'a Vec<T>) -> Self {
        FieldValue::List(v.len())
    }
}

/// Malformed constraint declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("unknown validation rule `{0}`")]
    Unknown(String),

    #[error("invalid parameter for `{rule}`: `{param}`")]
    InvalidParam { rule: &'static str, param: String },

    #[error("rule `{0}` requires a parameter")]
    MissingParam(&'static str),
}

/// A single constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    OmitEmpty,
    Email,
    Url,
    Ip,
    Cidr,
    Numeric,
    Alpha,
    Alphanum,
    Min(f64),
    Max(f64),
    Len(usize),
    OneOf(Vec<String>),
}

impl Rule {
    /// Identifier reported in validation errors.
    pub fn tag(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::OmitEmpty => "omitempty",
            Rule::Email => "email",
            Rule::Url => "url",
            Rule::Ip => "ip",
            Rule::Cidr => "cidr",
            Rule::Numeric => "numeric",
            Rule::Alpha => "alpha",
            Rule::Alphanum => "alphanum",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Len(_) => "len",
            Rule::OneOf(_) => "oneof",
        }
    }

    pub fn param(&self) -> Option<String> {
        match self {
            Rule::Min(n) | Rule::Max(n) => Some(n.to_string()),
            Rule::Len(n) => Some(n.to_string()),
            Rule::OneOf(options) => Some(options.join(" ")),
            _ => None,
        }
    }

    /// Parse one declaration such as `min=3`.
    pub fn parse(decl: &str) -> Result<Rule, RuleError> {
        let (name, param) = match decl.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (decl.trim(), None),
        };

        let rule = match name {
            "required" => Rule::Required,
            "omitempty" => Rule::OmitEmpty,
            "email" => Rule::Email,
            "url" => Rule::Url,
            "ip" => Rule::Ip,
            "cidr" => Rule::Cidr,
            "numeric" => Rule::Numeric,
            "alpha" => Rule::Alpha,
            "alphanum" => Rule::Alphanum,
            "min" => Rule::Min(number_param("min", param)?),
            "max" => Rule::Max(number_param("max", param)?),
            "len" => {
                let param = param.ok_or(RuleError::MissingParam("len"))?;
                Rule::Len(param.parse().map_err(|_| RuleError::InvalidParam {
                    rule: "len",
                    param: param.to_string(),
                })?)
            }
            "oneof" => {
                let options: Vec<String> = param
                    .ok_or(RuleError::MissingParam("oneof"))?
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                if options.is_empty() {
                    return Err(RuleError::MissingParam("oneof"));
                }
                Rule::OneOf(options)
            }
            other => return Err(RuleError::Unknown(other.to_string())),
        };

        if param.is_some() && rule.param().is_none() {
            return Err(RuleError::InvalidParam {
                rule: rule.tag(),
                param: param.unwrap_or_default().to_string(),
            });
        }
        Ok(rule)
    }

    /// Check a value. `omitempty` is handled by the engine and always passes.
    pub fn check(&self, value: &FieldValue<'_>) -> bool {
        match self {
            Rule::Required => !value.is_zero(),
            Rule::OmitEmpty => true,
            Rule::Email => as_str(value).is_some_and(|s| EMAIL.is_match(s)),
            Rule::Url => as_str(value).is_some_and(|s| url::Url::parse(s).is_ok()),
            Rule::Ip => as_str(value).is_some_and(|s| s.parse::<IpAddr>().is_ok()),
            Rule::Cidr => as_str(value).is_some_and(|s| s.parse::<Cidr>().is_ok()),
            Rule::Numeric => match value {
                FieldValue::Str(s) => NUMERIC.is_match(s),
                FieldValue::Int(_) | FieldValue::Float(_) => true,
                _ => false,
            },
            Rule::Alpha => as_str(value)
                .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())),
            Rule::Alphanum => as_str(value)
                .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())),
            Rule::Min(min) => value.size().is_some_and(|size| size >= *min),
            Rule::Max(max) => value.size().is_some_and(|size| size <= *max),
            Rule::Len(len) => value.size().is_some_and(|size| size == *len as f64),
            Rule::OneOf(options) => match value {
                FieldValue::Str(s) => options.iter().any(|o| o == s),
                FieldValue::Int(n) => options.iter().any(|o| *o == n.to_string()),
                _ => false,
            },
        }
    }
}

fn as_str<'a>(value: &FieldValue<'a>) -> Option<&'a str> {
    match *value {
        FieldValue::Str(s) => Some(s),
        _ => None,
    }
}

fn number_param(rule: &'static str, param: Option<&str>) -> Result<f64, RuleError> {
    let param = param.ok_or(RuleError::MissingParam(rule))?;
    param.parse().map_err(|_| RuleError::InvalidParam {
        rule,
        param: param.to_string(),
    })
}

/// Parse a full declaration such as `"required,email"`.
pub fn parse_rules(decl: &str) -> Result<Vec<Rule>, RuleError> {
    decl.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(Rule::parse)
        .collect()
}
