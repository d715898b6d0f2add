//! Campaign: one letter, from compilation to the final summary

use std::{fmt, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::domain::{
    dispatch::{
        errors::DispatchError, CredentialProvider, DispatchMode, DispatchRun, Dispatcher, Relay,
    },
    letters::Letter,
    messages::{bind_sender, errors::CompileError, CompileMode, MessageCompiler},
    progress::ProgressSink,
    reconciliation::{BounceReconciler, Mailbox, Reconciliation},
    validation::ValidationMode,
};

const DRY_RUN_NOTICE: &str = "This is a dry run, no emails were actually sent";

/// Fatal campaign errors
#[derive(Debug, Error)]
pub enum CampaignError {
    /// The letter could not be compiled
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The relay could not be used
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Options of a campaign
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignOptions {
    /// The operator's display name
    pub sender_name: String,

    /// How template violations are reported
    pub validation_mode: ValidationMode,
}

/// Final outcome of a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    /// Messages attempted
    pub attempted: usize,

    /// Messages accepted, less confirmed bounces
    pub succeeded: usize,

    /// Whether nothing was actually transmitted
    pub dry_run: bool,

    /// Whether every message went to the sender
    pub test_mode: bool,

    /// What the bounce check found
    pub reconciliation: Reconciliation,
}

/// Sends one letter and reconciles its bounces
pub struct Campaign<R, M, C, S>
where
    R: Relay,
    M: Mailbox,
    C: CredentialProvider,
    S: ProgressSink,
{
    dispatcher: Dispatcher<R, S>,
    reconciler: BounceReconciler<M, S>,
    credentials: Arc<C>,
    sink: Arc<S>,
    options: CampaignOptions,
}

impl<R, M, C, S> fmt::Debug for Campaign<R, M, C, S>
where
    R: Relay,
    M: Mailbox,
    C: CredentialProvider,
    S: ProgressSink,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Campaign")
            .field("dispatcher", &self.dispatcher)
            .field("reconciler", &self.reconciler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R, M, C, S> Campaign<R, M, C, S>
where
    R: Relay,
    M: Mailbox,
    C: CredentialProvider,
    S: ProgressSink,
{
    /// Creates a new campaign.
    pub fn new(
        dispatcher: Dispatcher<R, S>,
        reconciler: BounceReconciler<M, S>,
        credentials: Arc<C>,
        sink: Arc<S>,
        options: CampaignOptions,
    ) -> Self {
        Self {
            dispatcher,
            reconciler,
            credentials,
            sink,
            options,
        }
    }

    /// Compiles, sends and reconciles `letter`.
    ///
    /// In test mode only the first message is compiled, and it is delivered
    /// to the sender.
    ///
    /// # Returns
    /// - [`Ok`] with the [`CampaignReport`], even when some messages failed
    ///   or the mailbox could not be checked.
    /// - [`Err`] with a [`CampaignError`] if nothing could be sent at all.
    pub async fn run(
        &mut self,
        letter: &Letter,
        mode: DispatchMode,
    ) -> Result<CampaignReport, CampaignError> {
        let compile_mode = if mode.test_mode {
            CompileMode::Preview
        } else {
            CompileMode::All
        };

        let mut messages = MessageCompiler::for_letter(letter, &self.options.sender_name)
            .with_validation_mode(self.options.validation_mode)
            .compile(letter.recipients(), compile_mode)
            .await?;

        let identity = self
            .dispatcher
            .authenticate(self.credentials.as_ref())
            .await?
            .clone();

        bind_sender(&mut messages, &identity.address);

        let mut run = DispatchRun::new();
        self.dispatcher.dispatch(&messages, mode, &mut run).await?;

        if mode.dry_run {
            self.sink.notice(DRY_RUN_NOTICE);
        }

        // Dry runs are reconciled as well: bounces still in the mailbox from an
        // earlier real send to the same recipients are discounted from this run.
        let reconciliation = self.reconciler.reconcile(&mut run, &identity.credentials).await;

        info!(
            "{} / {} emails sent successfully",
            run.succeeded(),
            run.attempted()
        );
        self.sink.summary(run.succeeded(), run.attempted());

        Ok(CampaignReport {
            attempted: run.attempted(),
            succeeded: run.succeeded(),
            dry_run: mode.dry_run,
            test_mode: mode.test_mode,
            reconciliation,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use mockall::predicate::{always, eq};
    use testresult::TestResult;

    use crate::domain::{
        addresses::tests::MockDomainResolver,
        dispatch::{
            errors::RelayError,
            tests::{MockCredentialProvider, MockRelay},
            Credentials, Secret,
        },
        letters::LoadOptions,
        progress::tests::MockProgressSink,
        reconciliation::tests::MockMailbox,
    };

    use super::*;

    async fn letter(dir: &std::path::Path) -> TestResult<Letter> {
        fs::write(dir.join("config.yml"), "subject: Hi\nrecipientTitle: 同學\n")?;
        fs::write(dir.join("content.html"), "<p>$name</p><p>$sender</p>")?;
        fs::write(
            dir.join("recipients.csv"),
            "email,name\na@x.edu,甲\nb@x.edu,乙\nc@x.edu,丙\n",
        )?;

        let mut resolver = MockDomainResolver::new();
        resolver.expect_resolves().returning(|_| true);

        Ok(Letter::open(dir, &resolver, &LoadOptions::default()).await?)
    }

    fn provider() -> Arc<MockCredentialProvider> {
        let mut provider = MockCredentialProvider::new();
        provider
            .expect_credentials()
            .returning(|| Ok(Credentials::new("me", Secret::new("hunter2"))));
        Arc::new(provider)
    }

    fn options() -> CampaignOptions {
        CampaignOptions {
            sender_name: "系學會".to_string(),
            ..CampaignOptions::default()
        }
    }

    fn bounce(address: &str) -> Vec<u8> {
        format!("Subject: Delivery Status Notification (Failure)\r\n\r\n{address}\r\n").into_bytes()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sends_and_reconciles() -> TestResult {
        let dir = tempfile::tempdir()?;
        let letter = letter(dir.path()).await?;

        let mut relay = MockRelay::new();
        relay.expect_connect().times(1).returning(|| Ok(()));
        relay.expect_authenticate().times(1).returning(|_| Ok(()));
        relay
            .expect_send()
            .times(3)
            .returning(|message, _| {
                assert_eq!(
                    message.from().map(|f| f.address.as_str()),
                    Some("me@ntu.edu.tw")
                );
                if message.to().as_str() == "c@x.edu" {
                    Err(RelayError::SendError("550".to_string()))
                } else {
                    Ok(())
                }
            });

        let mut mailbox = MockMailbox::new();
        mailbox
            .expect_fetch_recent()
            .with(eq(Credentials::new("me", Secret::new("hunter2"))), eq(3))
            .times(1)
            .returning(|_, _| Ok(vec![bounce("b@x.edu")]));

        let mut sink = MockProgressSink::new();
        sink.expect_delivered().times(2).returning(|_, _| ());
        sink.expect_failed().times(1).returning(|_, _, _| ());
        sink.expect_bounced().times(1).returning(|_| ());
        sink.expect_summary()
            .with(eq(1), eq(3))
            .times(1)
            .returning(|_, _| ());
        let sink = Arc::new(sink);

        let mut campaign = Campaign::new(
            Dispatcher::new(relay, sink.clone()),
            BounceReconciler::new(mailbox, sink.clone()),
            provider(),
            sink,
            options(),
        );

        let report = campaign.run(&letter, DispatchMode::default()).await?;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(
            report.reconciliation,
            Reconciliation::Checked {
                bounced: vec!["b@x.edu".to_string()]
            }
        );

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_mode_sends_one_message_to_self() -> TestResult {
        let dir = tempfile::tempdir()?;
        let letter = letter(dir.path()).await?;

        let mut relay = MockRelay::new();
        relay.expect_connect().returning(|| Ok(()));
        relay.expect_authenticate().returning(|_| Ok(()));
        relay
            .expect_send()
            .withf(|message, recipients| {
                message.html_body() == "<p>甲同學</p><p>系學會</p>"
                    && recipients.iter().map(|r| r.as_str()).eq(["me@ntu.edu.tw"])
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut mailbox = MockMailbox::new();
        mailbox.expect_fetch_recent().returning(|_, _| Ok(vec![]));

        let mut sink = MockProgressSink::new();
        sink.expect_delivered()
            .withf(|_, to_self| *to_self)
            .times(1)
            .returning(|_, _| ());
        sink.expect_notice().returning(|_| ());
        sink.expect_summary().with(eq(1), eq(1)).times(1).returning(|_, _| ());
        let sink = Arc::new(sink);

        let mut campaign = Campaign::new(
            Dispatcher::new(relay, sink.clone()),
            BounceReconciler::new(mailbox, sink.clone()).with_settle_delay(Duration::ZERO),
            provider(),
            sink,
            options(),
        );

        let mode = DispatchMode {
            test_mode: true,
            ..DispatchMode::default()
        };
        let report = campaign.run(&letter, mode).await?;

        assert_eq!(report.attempted, 1);
        assert!(report.test_mode);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_notice() -> TestResult {
        let dir = tempfile::tempdir()?;
        let letter = letter(dir.path()).await?;

        let mut relay = MockRelay::new();
        relay.expect_connect().returning(|| Ok(()));
        relay.expect_authenticate().returning(|_| Ok(()));
        relay.expect_send().never();

        let mut mailbox = MockMailbox::new();
        mailbox
            .expect_fetch_recent()
            .with(always(), eq(3))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let mut sink = MockProgressSink::new();
        sink.expect_delivered().times(3).returning(|_, _| ());
        sink.expect_notice()
            .withf(|message| message == DRY_RUN_NOTICE)
            .times(1)
            .returning(|_| ());
        sink.expect_notice()
            .withf(|message| message != DRY_RUN_NOTICE)
            .returning(|_| ());
        sink.expect_summary().with(eq(3), eq(3)).times(1).returning(|_, _| ());
        let sink = Arc::new(sink);

        let mut campaign = Campaign::new(
            Dispatcher::new(relay, sink.clone()),
            BounceReconciler::new(mailbox, sink.clone()),
            provider(),
            sink,
            options(),
        );

        let mode = DispatchMode {
            dry_run: true,
            ..DispatchMode::default()
        };
        let report = campaign.run(&letter, mode).await?;

        assert_eq!(report.succeeded, 3);
        assert!(report.dry_run);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_exhaustion_aborts_before_sending() -> TestResult {
        let dir = tempfile::tempdir()?;
        let letter = letter(dir.path()).await?;

        let mut relay = MockRelay::new();
        relay.expect_connect().returning(|| Ok(()));
        relay
            .expect_authenticate()
            .times(3)
            .returning(|_| Err(RelayError::Authentication("535".to_string())));
        relay.expect_send().never();

        let mut mailbox = MockMailbox::new();
        mailbox.expect_fetch_recent().never();

        let mut sink = MockProgressSink::new();
        sink.expect_warn().times(3).returning(|_| ());
        sink.expect_summary().never();
        let sink = Arc::new(sink);

        let mut campaign = Campaign::new(
            Dispatcher::new(relay, sink.clone()),
            BounceReconciler::new(mailbox, sink.clone()),
            provider(),
            sink,
            options(),
        );

        let result = campaign.run(&letter, DispatchMode::default()).await;

        assert!(matches!(
            result,
            Err(CampaignError::Dispatch(DispatchError::AuthExhausted { attempts: 3 }))
        ));

        Ok(())
    }
}
