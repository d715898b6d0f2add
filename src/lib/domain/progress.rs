//! Progress reporting

use std::time::Duration;

#[cfg(test)]
use mockall::mock;

use crate::domain::addresses::EmailAddress;

/// Receives progress events of a campaign. Purely observational: nothing a
/// sink does can change the outcome of a run.
pub trait ProgressSink: Send + Sync + 'static {
    /// A message was accepted by the relay (or would have been, in a dry run).
    ///
    /// # Arguments
    /// * `recipient` - The message's `To` address.
    /// * `to_self` - Whether the message was redirected to the sender.
    fn delivered(&self, recipient: &EmailAddress, to_self: bool);

    /// A message was rejected by the relay; `to_self` as for [`ProgressSink::delivered`]
    fn failed(&self, recipient: &EmailAddress, to_self: bool, reason: &str);

    /// The dispatcher is pausing to stay under the relay's rate limits
    fn resting(&self, duration: Duration);

    /// Addresses whose messages bounced
    fn bounced(&self, addresses: &[EmailAddress]);

    /// Informational notice
    fn notice(&self, message: &str);

    /// Non-fatal problem
    fn warn(&self, message: &str);

    /// Final success count
    fn summary(&self, succeeded: usize, attempted: usize);
}

#[cfg(test)]
mock! {
    pub ProgressSink {}

    impl ProgressSink for ProgressSink {
        fn delivered(&self, recipient: &EmailAddress, to_self: bool);
        fn failed(&self, recipient: &EmailAddress, to_self: bool, reason: &str);
        fn resting(&self, duration: Duration);
        fn bounced(&self, addresses: &[EmailAddress]);
        fn notice(&self, message: &str);
        fn warn(&self, message: &str);
        fn summary(&self, succeeded: usize, attempted: usize);
    }
}

#[cfg(test)]
pub mod tests {
    pub use super::MockProgressSink;

    /// A sink that accepts every event
    pub fn quiet_sink() -> MockProgressSink {
        let mut sink = MockProgressSink::new();
        sink.expect_delivered().returning(|_, _| ());
        sink.expect_failed().returning(|_, _, _| ());
        sink.expect_resting().returning(|_| ());
        sink.expect_bounced().returning(|_| ());
        sink.expect_notice().returning(|_| ());
        sink.expect_warn().returning(|_| ());
        sink.expect_summary().returning(|_, _| ());
        sink
    }
}
