//! Recipient table loader

use std::{
    collections::{hash_map::Entry, HashMap},
    io,
};

use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use crate::domain::{
    addresses::{complete_address, DomainResolver, EmailAddress, DEFAULT_DOMAIN},
    letters::errors::RecipientTableError,
    validation::{ValidationMode, Violation, Violations},
};

const SECTION: &str = "recipients.csv";

/// Columns every recipient table must provide
pub const REQUIRED_COLUMNS: [&str; 2] = ["email", "name"];

/// Columns holding addresses, normalized at load time
pub const ADDRESS_COLUMNS: [&str; 3] = ["email", "cc", "bcc"];

/// Options shared by the letter loaders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Whether to stop at the first violation or report all of them
    pub mode: ValidationMode,

    /// Domain appended to addresses written without one
    pub default_domain: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            default_domain: DEFAULT_DOMAIN.to_string(),
        }
    }
}

/// A validated row of the recipient table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRow {
    columns: HashMap<String, String>,
    email: EmailAddress,
    cc: Option<EmailAddress>,
    bcc: Option<EmailAddress>,
}

impl RecipientRow {
    /// The recipient's address
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// The recipient's name, as written in the table
    pub fn name(&self) -> &str {
        self.get("name").unwrap_or_default()
    }

    /// The row's own carbon-copy address
    pub fn cc(&self) -> Option<&EmailAddress> {
        self.cc.as_ref()
    }

    /// The row's own blind carbon-copy address
    pub fn bcc(&self) -> Option<&EmailAddress> {
        self.bcc.as_ref()
    }

    /// Look up a cell by its (case-sensitive) column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    /// Iterate over every `(column, value)` pair of the row
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A fully validated recipient table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientTable {
    headers: Vec<String>,
    rows: Vec<RecipientRow>,
}

impl RecipientTable {
    /// Loads and validates a recipient table from comma-delimited text.
    ///
    /// # Arguments
    /// * `source` - The delimited text; its first row names the columns.
    /// * `resolver` - Used to check that every recipient domain can receive mail.
    /// * `options` - Validation mode and default domain.
    ///
    /// # Returns
    /// The whole table, or a [`RecipientTableError`] carrying every violation
    /// found. No partial table is ever returned.
    pub async fn load<R, D>(
        source: R,
        resolver: &D,
        options: &LoadOptions,
    ) -> Result<Self, RecipientTableError>
    where
        R: io::Read,
        D: DomainResolver + ?Sized,
    {
        let (headers, records) = read_records(source)?;

        if let Some(missing) = check_columns(&headers, options.mode) {
            return Err(RecipientTableError::MalformedTable(missing));
        }

        let structure = check_rows(&headers, &records, options.mode);
        if structure.should_stop() {
            return Err(RecipientTableError::MalformedTable(structure));
        }

        let mut violations = Violations::new(options.mode);
        let mut rows = Vec::with_capacity(records.len());
        let mut resolved: HashMap<String, bool> = HashMap::new();

        for (i, record) in records.into_iter().enumerate() {
            if violations.should_stop() {
                break;
            }

            // ragged rows are already reported
            if record.len() != headers.len() {
                continue;
            }

            let row = i + 1;
            let mut columns: HashMap<String, String> =
                headers.iter().cloned().zip(record).collect();
            normalize_addresses(&mut columns, &options.default_domain);

            let email = match EmailAddress::new(&columns["email"]) {
                Ok(email) => email,
                Err(e) => {
                    warn!("recipients.csv has invalid email {} at row {row}", columns["email"]);
                    let reason = if columns["email"].is_empty() {
                        e.to_string()
                    } else {
                        format!("{} {e}", columns["email"])
                    };
                    violations.push(Violation::new(SECTION, "email", reason).at_row(row));
                    continue;
                }
            };

            let reachable = match resolved.entry(email.domain().to_string()) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => *entry.insert(resolver.resolves(email.domain()).await),
            };

            if !reachable {
                warn!("recipients.csv has unreachable email {email} at row {row}");
                violations.push(
                    Violation::new(
                        SECTION,
                        "email",
                        format!("{email}: domain {} does not accept mail", email.domain()),
                    )
                    .at_row(row),
                );
                continue;
            }

            let cc = optional_address(&columns, "cc", row, &mut violations);
            let bcc = optional_address(&columns, "bcc", row, &mut violations);

            rows.push(RecipientRow {
                columns,
                email,
                cc,
                bcc,
            });
        }

        match (structure.is_empty(), violations.is_empty()) {
            (true, true) => {}
            (false, true) => return Err(RecipientTableError::MalformedTable(structure)),
            (true, false) => return Err(RecipientTableError::InvalidAddress(violations)),
            (false, false) => {
                return Err(RecipientTableError::Rejected {
                    malformed: structure,
                    addresses: violations,
                })
            }
        }

        debug!("loaded {} recipients", rows.len());

        Ok(Self { headers, rows })
    }

    /// The column names, in table order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// The rows, in table order
    pub fn rows(&self) -> &[RecipientRow] {
        &self.rows
    }

    /// Number of recipients
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no recipients
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

type Records = (Vec<String>, Vec<Vec<String>>);

fn read_records<R: io::Read>(source: R) -> Result<Records, RecipientTableError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let records = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, csv::Error>>()?;

    Ok((headers, records))
}

fn check_columns(headers: &[String], mode: ValidationMode) -> Option<Violations> {
    let mut violations = Violations::new(mode);

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            violations.push(Violation::new(
                SECTION,
                required,
                "is a required column, but was not found",
            ));
        }
    }

    (!violations.is_empty()).then_some(violations)
}

fn check_rows(headers: &[String], records: &[Vec<String>], mode: ValidationMode) -> Violations {
    let mut violations = Violations::new(mode);
    let name = headers.iter().position(|h| h == "name");

    for (i, record) in records.iter().enumerate() {
        if violations.should_stop() {
            break;
        }

        let row = i + 1;

        if record.len() != headers.len() {
            violations.push(
                Violation::new(
                    SECTION,
                    "",
                    format!(
                        "expected {} fields, found {}",
                        headers.len(),
                        record.len()
                    ),
                )
                .at_row(row),
            );
            continue;
        }

        if name.is_some_and(|n| record[n].is_empty()) {
            violations.push(Violation::new(SECTION, "name", "cannot be empty").at_row(row));
        }
    }

    violations
}

fn normalize_addresses(columns: &mut HashMap<String, String>, default_domain: &str) {
    for column in ADDRESS_COLUMNS {
        if let Some(value) = columns.get_mut(column) {
            if !value.is_empty() {
                *value = complete_address(&value.to_lowercase(), default_domain);
            }
        }
    }
}

fn optional_address(
    columns: &HashMap<String, String>,
    column: &str,
    row: usize,
    violations: &mut Violations,
) -> Option<EmailAddress> {
    let value = columns.get(column).filter(|v| !v.is_empty())?;

    match EmailAddress::new(value) {
        Ok(address) => Some(address),
        Err(e) => {
            violations.push(Violation::new(SECTION, column, format!("{value} {e}")).at_row(row));
            None
        }
    }
}
