//! Messages module.
//!
//! Turns a letter into individually addressed messages. Construction is two
//! phased: [`MessageCompiler::compile`] renders every message, then
//! [`bind_sender`] fills in the `From` and final `Bcc` headers once the
//! authenticated sender is known.

mod compiler;
mod message;

pub mod errors;

pub use compiler::{compile, CompileMode, MessageCompiler};
pub use message::{
    bind_sender, Attachment, CompiledMessage, SenderMailbox, ATTACHMENT_CONTENT_TYPE,
};
