//! Plain terminal output

use std::time::Duration;

use crate::domain::{addresses::EmailAddress, progress::ProgressSink};

/// Prints progress to stdout, problems to stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    /// Create a sink. A quiet sink does not print successful deliveries.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

fn recipient_label(recipient: &EmailAddress, to_self: bool) -> String {
    if to_self {
        format!("{recipient} (yourself)")
    } else {
        recipient.to_string()
    }
}

impl ProgressSink for ConsoleSink {
    fn delivered(&self, recipient: &EmailAddress, to_self: bool) {
        if !self.quiet {
            println!(
                "successfully sent email to {}",
                recipient_label(recipient, to_self)
            );
        }
    }

    fn failed(&self, recipient: &EmailAddress, to_self: bool, reason: &str) {
        eprintln!(
            "failed to send email to {}: {reason}",
            recipient_label(recipient, to_self)
        );
    }

    fn resting(&self, duration: Duration) {
        println!("resting for {} seconds...", duration.as_secs());
    }

    fn bounced(&self, addresses: &[EmailAddress]) {
        eprintln!("Emails sent to these addresses are bounced back (failed):");
        for address in addresses {
            eprintln!("\t{address},");
        }
        eprintln!("Please check these emails.");
    }

    fn notice(&self, message: &str) {
        println!("{message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("{message}");
    }

    fn summary(&self, succeeded: usize, attempted: usize) {
        println!("{succeeded} / {attempted} emails sent successfully");
    }
}
