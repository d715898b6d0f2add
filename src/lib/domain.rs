//! Domain layer: letters, compiled messages, dispatch and reconciliation.

pub mod addresses;
pub mod campaign;
pub mod dispatch;
pub mod letters;
pub mod messages;
pub mod progress;
pub mod reconciliation;
pub mod validation;
