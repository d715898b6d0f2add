//! Bounce reconciler

use std::{collections::BTreeSet, fmt, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::{
    addresses::EmailAddress,
    dispatch::{Credentials, DispatchRun},
    progress::ProgressSink,
    reconciliation::{bounced_address, Mailbox},
};

/// Wait before looking for bounces
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Outcome of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Nothing was attempted, so nothing was checked
    NothingSent,

    /// The mailbox could not be read; counts are as dispatched
    Unavailable {
        /// Why the mailbox could not be read
        reason: String,
    },

    /// The mailbox was checked
    Checked {
        /// Distinct recipients whose messages bounced
        bounced: Vec<String>,
    },
}

/// Adjusts a run's success count from bounce notifications
pub struct BounceReconciler<M, S>
where
    M: Mailbox,
    S: ProgressSink,
{
    mailbox: M,
    sink: Arc<S>,
    settle_delay: Duration,
}

impl<M, S> fmt::Debug for BounceReconciler<M, S>
where
    M: Mailbox,
    S: ProgressSink,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BounceReconciler")
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl<M, S> BounceReconciler<M, S>
where
    M: Mailbox,
    S: ProgressSink,
{
    /// Create a reconciler owning `mailbox`
    pub fn new(mailbox: M, sink: Arc<S>) -> Self {
        Self {
            mailbox,
            sink,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Replace the settle delay
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Looks for bounces of `run` and removes them from its success count.
    ///
    /// Never fails: when the mailbox cannot be read the problem is reported
    /// to the sink and the run is left untouched.
    pub async fn reconcile(&self, run: &mut DispatchRun, credentials: &Credentials) -> Reconciliation {
        if run.attempted() == 0 {
            self.sink.notice("No emails were sent, nothing to check");
            return Reconciliation::NothingSent;
        }

        debug!("waiting {:?} for bounces to arrive", self.settle_delay);
        sleep(self.settle_delay).await;

        let count = run.recipients().len();
        let messages = match self.mailbox.fetch_recent(credentials, count).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("failed to check bounces: {e}");
                self.sink.warn(&format!("Failed to check bounce-backs: {e}"));
                return Reconciliation::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        info!("checking {} messages for bounces", messages.len());

        let bounced: BTreeSet<EmailAddress> = messages
            .iter()
            .filter_map(|raw| bounced_address(raw))
            .filter_map(|address| EmailAddress::new(&address).ok())
            .filter(|address| run.recipients().contains(address))
            .collect();

        let bounced: Vec<EmailAddress> = bounced.into_iter().collect();

        if bounced.is_empty() {
            self.sink
                .notice("No bounce-backs found, all emails are delivered successfully");
        } else {
            warn!("{} messages bounced", bounced.len());
            self.sink.bounced(&bounced);
        }

        run.discount_bounces(bounced.len());

        Reconciliation::Checked {
            bounced: bounced.into_iter().map(String::from).collect(),
        }
    }
}
