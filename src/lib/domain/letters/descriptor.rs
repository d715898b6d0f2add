//! Letter descriptor (`config.yml`)

use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

use crate::domain::{
    addresses::{complete_address, EmailAddress},
    letters::LoadOptions,
    validation::{Violation, Violations},
};

/// Subject and addressing policy of a letter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterSpec {
    /// The subject line shared by every message
    pub subject: String,

    /// Literal display name for the `From` header
    pub from: Option<String>,

    /// Title appended to every recipient name, e.g. `同學`
    pub recipient_title: Option<String>,

    /// Shorten recipient names before the title is appended
    pub last_name_only: bool,

    /// Carbon copies added to every message
    pub cc: Vec<EmailAddress>,

    /// Blind carbon copies added to every message
    pub bcc: Vec<EmailAddress>,

    /// Also send a blind copy of every message to the sender
    pub bcc_to_sender: bool,

    /// Files attached to every message, sorted by name
    pub attachments: Vec<PathBuf>,
}

impl LetterSpec {
    /// Parses and validates a YAML descriptor.
    ///
    /// Unknown keys and wrongly typed values are reported as violations of
    /// `section`; `cc` and `bcc` entries are completed with the default domain.
    pub fn from_yaml(
        source: &str,
        section: &str,
        options: &LoadOptions,
    ) -> Result<Self, Violations> {
        let mut violations = Violations::new(options.mode);

        let mapping = match serde_yaml::from_str::<Value>(source) {
            Ok(Value::Mapping(mapping)) => mapping,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                violations.push(Violation::new(section, "", "should be a mapping"));
                return Err(violations);
            }
            Err(e) => {
                violations.push(Violation::new(section, "", format!("is not valid YAML: {e}")));
                return Err(violations);
            }
        };

        let mut spec = LetterSpec::default();
        let mut has_subject = false;

        for (key, value) in &mapping {
            if violations.should_stop() {
                break;
            }

            let Some(key) = key.as_str() else {
                violations.push(Violation::new(section, "", "keys should be strings"));
                continue;
            };

            match key {
                "subject" => {
                    if let Some(subject) = expect_string(value, section, key, &mut violations) {
                        spec.subject = subject;
                        has_subject = true;
                    }
                }
                "from" => spec.from = expect_string(value, section, key, &mut violations),
                "recipientTitle" => {
                    spec.recipient_title = expect_string(value, section, key, &mut violations)
                }
                "lastNameOnly" => {
                    spec.last_name_only =
                        expect_bool(value, section, key, &mut violations).unwrap_or_default()
                }
                "bccToSender" => {
                    spec.bcc_to_sender =
                        expect_bool(value, section, key, &mut violations).unwrap_or_default()
                }
                "cc" => spec.cc = expect_addresses(value, section, key, options, &mut violations),
                "bcc" => spec.bcc = expect_addresses(value, section, key, options, &mut violations),
                _ => violations.push(Violation::new(section, key, "unknown field")),
            }
        }

        if !has_subject && !mapping.contains_key("subject") {
            violations.push(Violation::new(section, "subject", "required"));
        }

        if violations.is_empty() {
            Ok(spec)
        } else {
            Err(violations)
        }
    }
}

fn expect_string(
    value: &Value,
    section: &str,
    field: &str,
    violations: &mut Violations,
) -> Option<String> {
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            violations.push(Violation::new(section, field, "should be string"));
            None
        }
    }
}

fn expect_bool(
    value: &Value,
    section: &str,
    field: &str,
    violations: &mut Violations,
) -> Option<bool> {
    match value.as_bool() {
        Some(b) => Some(b),
        None => {
            violations.push(Violation::new(section, field, "should be boolean"));
            None
        }
    }
}

fn expect_addresses(
    value: &Value,
    section: &str,
    field: &str,
    options: &LoadOptions,
    violations: &mut Violations,
) -> Vec<EmailAddress> {
    let Some(items) = value.as_sequence() else {
        violations.push(Violation::new(section, field, "should be list"));
        return Vec::new();
    };

    let mut addresses = Vec::with_capacity(items.len());

    for item in items {
        let Some(raw) = item.as_str() else {
            violations.push(Violation::new(section, field, "entries should be strings"));
            continue;
        };

        let completed = complete_address(&raw.trim().to_lowercase(), &options.default_domain);

        match EmailAddress::new(&completed) {
            Ok(address) => addresses.push(address),
            Err(e) => violations.push(Violation::new(section, field, format!("{completed} {e}"))),
        }
    }

    addresses
}
