//! Structured validation reports shared by the letter validators.
//!
//! Validators never raise on their own: they record [`Violation`]s into a
//! [`Violations`] report and the caller decides what to do with it. In
//! [`ValidationMode::FailFast`] the report tells validators to stop once the
//! first violation is recorded; in [`ValidationMode::Exhaustive`] every
//! violation is collected so the operator can fix them all at once.

use std::fmt;

/// How many violations a validator should collect before giving up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Stop at the first violation (scripted, quiet runs)
    FailFast,

    /// Collect every violation (interactive, verbose runs)
    #[default]
    Exhaustive,
}

/// A single validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The artifact the violation was found in, e.g. `recipients.csv`
    pub section: String,

    /// The offending field or column
    pub field: String,

    /// What is wrong with it
    pub reason: String,

    /// 1-based data row, for tabular artifacts
    pub row: Option<usize>,
}

impl Violation {
    /// Create a violation that is not tied to a row
    pub fn new(section: &str, field: &str, reason: impl Into<String>) -> Self {
        Self {
            section: section.to_string(),
            field: field.to_string(),
            reason: reason.into(),
            row: None,
        }
    }

    /// Attach a data row number
    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}: {}", self.section, self.reason)?;
        } else {
            write!(f, "{}/{}: {}", self.section, self.field, self.reason)?;
        }

        if let Some(row) = self.row {
            write!(f, " (row {row})")?;
        }

        Ok(())
    }
}

/// An ordered collection of violations, filled according to a [`ValidationMode`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations {
    mode: ValidationMode,
    items: Vec<Violation>,
}

impl Violations {
    /// Create an empty report
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
        }
    }

    /// Record a violation. In fail-fast mode only the first one is kept.
    pub fn push(&mut self, violation: Violation) {
        if self.should_stop() {
            return;
        }

        self.items.push(violation);
    }

    /// Whether a validator should stop looking for more violations
    pub fn should_stop(&self) -> bool {
        self.mode == ValidationMode::FailFast && !self.items.is_empty()
    }

    /// Whether no violation was recorded
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of recorded violations
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate over the recorded violations
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.items.iter()
    }

    /// The first recorded violation
    pub fn first(&self) -> Option<&Violation> {
        self.items.first()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "    {violation}")?;
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
