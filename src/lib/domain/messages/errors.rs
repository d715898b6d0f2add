//! Message compiler errors

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::letters::errors::LetterError;

/// Errors that can occur when compiling a letter into messages
#[derive(Debug, Error)]
pub enum CompileError {
    /// The template does not match the recipient table
    #[error(transparent)]
    Letter(#[from] LetterError),

    /// An attachment could not be read
    #[error("could not read attachment {}: {source}", path.display())]
    Attachment {
        /// The attachment path
        path: PathBuf,

        /// The underlying error
        source: std::io::Error,
    },
}
