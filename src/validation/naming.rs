//! Field-name resolution from serialization tags.

/// Tag value that excludes a field from a serialization format.
pub const OMIT: &str = "-";

/// Serialization tags declared on a field, as written (options included).
///
/// `json` and `form` follow the serde rename conventions of the binding
/// extractors; `query` names the field in the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldTags<'a> {
    pub json: Option<&'a str>,
    pub form: Option<&'a str>,
    pub query: Option<&'a str>,
}

impl<'a> FieldTags<'a> {
    pub const fn none() -> Self {
        Self {
            json: None,
            form: None,
            query: None,
        }
    }
}

fn tag_name(tag: Option<&str>) -> Option<&str> {
    let name = tag?.split(',').next()?;
    (!name.is_empty() && name != OMIT).then_some(name)
}

/// Externally visible name of a field: json, then form, then query.
///
/// Returns `None` when no tag yields a usable name; callers fall back to
/// the field identifier.
pub fn resolve_field_name<'a>(tags: &FieldTags<'a>) -> Option<&'a str> {
    [tags.json, tags.form, tags.query]
        .into_iter()
        .find_map(tag_name)
}
