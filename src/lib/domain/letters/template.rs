//! HTML body template with `$field` substitutions

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::domain::{
    letters::errors::LetterError,
    validation::{ValidationMode, Violation, Violations},
};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(
        r"\$(?:(?P<escaped>\$)|\{(?P<braced>[_a-z][_a-z0-9]*)\}|(?P<named>[_a-z][_a-z0-9]*))"
    )
    .unwrap();
}

const SECTION: &str = "content.html";

/// Computed field holding the sender's display name
pub const SENDER_FIELD: &str = "sender";

/// Structural recipient columns that can never be substituted
pub const RESERVED_FIELDS: [&str; 3] = ["email", "cc", "bcc"];

/// A parsed body template.
///
/// Placeholders are `$field` or `${field}` where `field` starts with a
/// lower-case letter or underscore followed by lower-case letters, digits or
/// underscores. `$$` renders a literal `$`; any other `$` is left as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyTemplate {
    source: String,
    fields: Vec<String>,
}

impl BodyTemplate {
    /// Parse a template, extracting its fields in order of first appearance
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut fields: Vec<String> = Vec::new();

        for caps in PLACEHOLDER.captures_iter(&source) {
            if let Some(field) = field_name(&caps) {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
            }
        }

        Self { source, fields }
    }

    /// The raw template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The distinct fields referenced by the template
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Cross-checks the template fields against the recipient columns.
    ///
    /// # Returns
    /// - [`LetterError::ReservedField`] when `email`, `cc` or `bcc` is used as a field.
    /// - [`LetterError::UnknownField`] when a field is neither a column nor `sender`.
    pub fn validate(&self, columns: &[String], mode: ValidationMode) -> Result<(), LetterError> {
        let mut reserved = Violations::new(mode);

        for field in self.fields() {
            if RESERVED_FIELDS.contains(&field) {
                reserved.push(Violation::new(
                    SECTION,
                    field,
                    "is a reserved field, it cannot be used in the letter template",
                ));
            }
        }

        if !reserved.is_empty() {
            return Err(LetterError::ReservedField(reserved));
        }

        let mut unknown = Violations::new(mode);

        for field in self.fields() {
            if field != SENDER_FIELD && !columns.iter().any(|c| c == field) {
                unknown.push(Violation::new(
                    SECTION,
                    field,
                    "is used in the letter template, but is not a column of recipients.csv",
                ));
            }
        }

        if !unknown.is_empty() {
            return Err(LetterError::UnknownField(unknown));
        }

        Ok(())
    }

    /// Renders the template. Substituted values are never re-scanned, so
    /// rendering is a single pass.
    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String, LetterError> {
        let mut missing = Violations::new(ValidationMode::Exhaustive);

        for field in self.fields() {
            if !values.contains_key(field) {
                missing.push(Violation::new(SECTION, field, "has no value to substitute"));
            }
        }

        if !missing.is_empty() {
            return Err(LetterError::UnknownField(missing));
        }

        let rendered = PLACEHOLDER.replace_all(&self.source, |caps: &Captures<'_>| {
            match field_name(caps) {
                Some(field) => values.get(field).copied().unwrap_or_default(),
                None => "$",
            }
        });

        Ok(rendered.into_owned())
    }
}

fn field_name<'c>(caps: &Captures<'c>) -> Option<&'c str> {
    caps.name("braced")
        .or_else(|| caps.name("named"))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_parse_extracts_distinct_fields() {
        let template = BodyTemplate::parse("<p>$name ${group} $name $$5 $Upper $1</p>");

        assert_eq!(template.fields().collect::<Vec<_>>(), vec!["name", "group"]);
    }

    #[test]
    fn test_render_substitutes_every_field() -> TestResult {
        let template = BodyTemplate::parse("<p>Dear $name,</p><p>${group}組 costs $$5</p><p>$sender</p>");
        let values = HashMap::from([("name", "王同學"), ("group", "A"), ("sender", "系學會")]);

        let html = template.render(&values)?;

        assert_eq!(html, "<p>Dear 王同學,</p><p>A組 costs $5</p><p>系學會</p>");

        Ok(())
    }

    #[test]
    fn test_render_does_not_rescan_values() -> TestResult {
        let template = BodyTemplate::parse("$name");
        let values = HashMap::from([("name", "$sender")]);

        assert_eq!(template.render(&values)?, "$sender");

        Ok(())
    }

    #[test]
    fn test_render_requires_every_field() {
        let template = BodyTemplate::parse("$name $missing");
        let values = HashMap::from([("name", "A")]);

        assert!(matches!(
            template.render(&values),
            Err(LetterError::UnknownField(_))
        ));
    }

    #[test]
    fn test_validate_accepts_columns_and_sender() -> TestResult {
        let template = BodyTemplate::parse("$name $group $sender");

        template.validate(&columns(&["email", "name", "group"]), ValidationMode::Exhaustive)?;

        Ok(())
    }

    #[test]
    fn test_validate_rejects_reserved_fields() {
        let template = BodyTemplate::parse("$name $email $cc");

        let result = template.validate(&columns(&["email", "name", "cc"]), ValidationMode::Exhaustive);

        match result {
            Err(LetterError::ReservedField(violations)) => assert_eq!(violations.len(), 2),
            other => panic!("expected reserved fields, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_unknown_fields() {
        let template = BodyTemplate::parse("$name $seat $room");

        let result = template.validate(&columns(&["email", "name"]), ValidationMode::FailFast);

        match result {
            Err(LetterError::UnknownField(violations)) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations.first().map(|v| v.field.as_str()), Some("seat"));
            }
            other => panic!("expected unknown fields, got {other:?}"),
        }
    }
}
