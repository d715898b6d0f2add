//! Letters module.
//!
//! A letter is a directory bundling a descriptor (`config.yml`), an HTML body
//! template (`content.html`), a recipient table (`recipients.csv`) and an
//! optional `attachments/` directory.

mod descriptor;
mod letter;
mod names;
mod recipients;
mod template;

pub mod errors;

pub use descriptor::LetterSpec;
pub use letter::{Letter, LetterPaths};
pub use names::{LastWord, LeadingCharacter, NameShortener, RecipientNameFormat};
pub use recipients::{LoadOptions, RecipientRow, RecipientTable};
pub use template::{BodyTemplate, RESERVED_FIELDS, SENDER_FIELD};
