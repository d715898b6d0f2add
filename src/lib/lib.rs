#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Letter mailer library
//!
//! Compiles a letter directory into individually addressed messages, sends
//! them through an SMTP relay under adaptive pacing, and reconciles bounce
//! notifications from a POP3 mailbox.

pub mod domain;
pub mod infrastructure;
