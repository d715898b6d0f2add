//! Error types for letters and recipient tables

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::validation::Violations;

/// Errors that can occur when loading a recipient table
#[derive(Debug, Error)]
pub enum RecipientTableError {
    /// Ragged rows, missing required columns or empty names
    #[error("malformed recipient table:\n{0}")]
    MalformedTable(Violations),

    /// One or more addresses failed syntax or DNS validation
    #[error("invalid recipient addresses:\n{0}")]
    InvalidAddress(Violations),

    /// Both structural and address violations were found
    #[error("malformed recipient table:\n{malformed}\ninvalid recipient addresses:\n{addresses}")]
    Rejected {
        /// Ragged rows and empty names
        malformed: Violations,

        /// Invalid or unresolvable addresses
        addresses: Violations,
    },

    /// The table could not be read as delimited text
    #[error("could not read the recipient table: {0}")]
    Read(#[from] csv::Error),
}

/// Errors that can occur when opening or checking a letter
#[derive(Debug, Error)]
pub enum LetterError {
    /// Missing artifacts, wrong artifact types or descriptor schema violations
    #[error("invalid letter:\n{0}")]
    InvalidLetter(Violations),

    /// The body template uses a structural column as a substitution field
    #[error("reserved fields used in the letter template:\n{0}")]
    ReservedField(Violations),

    /// The body template uses a field the recipient table does not provide
    #[error("unknown fields in the letter template:\n{0}")]
    UnknownField(Violations),

    /// The recipient table was rejected
    #[error(transparent)]
    Recipients(#[from] RecipientTableError),

    /// A letter artifact could not be read
    #[error("could not read {}: {source}", path.display())]
    Io {
        /// The artifact path
        path: PathBuf,

        /// The underlying error
        source: std::io::Error,
    },
}
