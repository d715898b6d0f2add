//! Dispatch accounting

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::addresses::EmailAddress;

/// Counters of a whole run, shared by every dispatch call and the bounce
/// reconciler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchRun {
    attempted: usize,
    succeeded: usize,
    recipients: BTreeSet<EmailAddress>,
}

impl DispatchRun {
    /// Create an empty run
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages attempted so far, in every mode
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Messages accepted so far, less confirmed bounces
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Distinct recipients attempted so far
    pub fn recipients(&self) -> &BTreeSet<EmailAddress> {
        &self.recipients
    }

    pub(crate) fn record_attempt(&mut self, recipient: &EmailAddress) {
        self.attempted += 1;
        self.recipients.insert(recipient.clone());
    }

    pub(crate) fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Removes confirmed bounces from the success count
    pub(crate) fn discount_bounces(&mut self, bounced: usize) {
        self.succeeded = self.succeeded.saturating_sub(bounced);
    }
}

/// Outcome of a single dispatch call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Messages attempted by this call
    pub attempted: usize,

    /// Messages accepted by this call
    pub succeeded: usize,
}
