//! Reconciliation module.
//!
//! After a run, bounce notifications are looked up among the most recent
//! messages of the sender's mailbox and the success count is adjusted.
//!
//! Correlation is approximate: as many messages are fetched as there were
//! distinct recipients, and a bounce is matched by the first address found
//! in its body rather than by `Message-ID`. Unrelated mail arriving in the
//! meantime can push bounces out of the fetched window.

mod bounces;
mod mailbox;
mod reconciler;

pub mod errors;

pub use bounces::bounced_address;
pub use mailbox::Mailbox;
pub use reconciler::{BounceReconciler, Reconciliation, DEFAULT_SETTLE_DELAY};
