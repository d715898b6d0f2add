//! Dispatch engine

use std::{fmt, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::domain::{
    addresses::{complete_address, EmailAddress, DEFAULT_DOMAIN},
    dispatch::{
        errors::DispatchError, CredentialProvider, Credentials, DispatchReport, DispatchRun,
        PacingPolicy, Relay,
    },
    messages::CompiledMessage,
    progress::ProgressSink,
};

/// Lifecycle of a [`Dispatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing happened yet
    Idle,

    /// Connected to the relay, not yet authenticated
    Connecting,

    /// Logged in and ready to send
    Authenticated,

    /// A batch is being sent
    Sending,

    /// The last batch has been sent
    Completed,

    /// Connecting or authenticating failed; nothing can be sent
    Aborted,
}

/// Options of a single dispatch call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchMode {
    /// Deliver every message to the sender instead of its recipients
    pub test_mode: bool,

    /// Count every message as sent without transmitting anything
    pub dry_run: bool,
}

/// The authenticated account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The credentials the relay accepted
    pub credentials: Credentials,

    /// The account's address, completed with the default domain
    pub address: EmailAddress,
}

/// Authentication retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRetry {
    /// Total number of attempts
    pub attempts: u32,

    /// Wait between two attempts
    pub backoff: Duration,
}

impl Default for AuthRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Sends compiled messages through a relay, strictly one after the other
pub struct Dispatcher<R, S>
where
    R: Relay,
    S: ProgressSink,
{
    relay: R,
    sink: Arc<S>,
    pacing: PacingPolicy,
    auth_retry: AuthRetry,
    default_domain: String,
    state: DispatchState,
    identity: Option<Identity>,
}

impl<R, S> fmt::Debug for Dispatcher<R, S>
where
    R: Relay,
    S: ProgressSink,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pacing", &self.pacing)
            .field("auth_retry", &self.auth_retry)
            .field("default_domain", &self.default_domain)
            .field("state", &self.state)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<R, S> Dispatcher<R, S>
where
    R: Relay,
    S: ProgressSink,
{
    /// Create a dispatcher owning `relay`
    pub fn new(relay: R, sink: Arc<S>) -> Self {
        Self {
            relay,
            sink,
            pacing: PacingPolicy::default(),
            auth_retry: AuthRetry::default(),
            default_domain: DEFAULT_DOMAIN.to_string(),
            state: DispatchState::Idle,
            identity: None,
        }
    }

    /// Replace the pacing policy
    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replace the authentication retry policy
    pub fn with_auth_retry(mut self, auth_retry: AuthRetry) -> Self {
        self.auth_retry = auth_retry;
        self
    }

    /// Domain used to complete the account identifier into an address
    pub fn with_default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = domain.into();
        self
    }

    /// The current state
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// The authenticated account, if any
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Connects to the relay. Only the first call opens a connection.
    ///
    /// # Returns
    /// [`DispatchError::RelayUnreachable`] if the relay cannot be reached;
    /// the dispatcher is then aborted.
    pub async fn connect(&mut self) -> Result<(), DispatchError> {
        if self.state != DispatchState::Idle {
            return Ok(());
        }

        self.state = DispatchState::Connecting;

        if let Err(e) = self.relay.connect().await {
            error!("failed to connect to the relay: {e}");
            self.state = DispatchState::Aborted;
            return Err(DispatchError::RelayUnreachable(e));
        }

        info!("connected to the relay");

        Ok(())
    }

    /// Authenticates with the relay, connecting first if needed.
    ///
    /// Credentials are requested again before every attempt, and attempts
    /// are separated by the retry backoff.
    ///
    /// # Returns
    /// - [`Ok`] with the authenticated [`Identity`].
    /// - [`DispatchError::AuthExhausted`] once every attempt has failed.
    pub async fn authenticate<C>(&mut self, provider: &C) -> Result<&Identity, DispatchError>
    where
        C: CredentialProvider + ?Sized,
    {
        self.connect().await?;

        if self.state == DispatchState::Aborted {
            return Err(DispatchError::NotAuthenticated);
        }

        let attempts = self.auth_retry.attempts;

        for attempt in 1..=attempts {
            let credentials = provider.credentials()?;
            let address = EmailAddress::new(&complete_address(
                &credentials.identifier.to_lowercase(),
                &self.default_domain,
            ))?;

            match self.relay.authenticate(&credentials).await {
                Ok(()) => {
                    info!("authenticated as {address}");
                    self.state = DispatchState::Authenticated;
                    return Ok(self.identity.insert(Identity {
                        credentials,
                        address,
                    }));
                }
                Err(e) => {
                    warn!("authentication attempt {attempt} of {attempts} failed: {e}");
                    self.sink
                        .warn(&format!("login failed ({attempt}/{attempts}): {e}"));

                    if attempt < attempts {
                        sleep(self.auth_retry.backoff).await;
                    }
                }
            }
        }

        self.state = DispatchState::Aborted;

        Err(DispatchError::AuthExhausted { attempts })
    }

    /// Sends `messages` in order, accounting every attempt into `run`.
    ///
    /// A message the relay refuses is reported and counted as not succeeded;
    /// the batch goes on.
    ///
    /// # Returns
    /// - [`Ok`] with the counts of this call.
    /// - [`DispatchError::NotAuthenticated`] or [`DispatchError::UnboundSender`]
    ///   before anything is sent.
    pub async fn dispatch(
        &mut self,
        messages: &[CompiledMessage],
        mode: DispatchMode,
        run: &mut DispatchRun,
    ) -> Result<DispatchReport, DispatchError> {
        let Some(identity) = self.identity.clone() else {
            return Err(DispatchError::NotAuthenticated);
        };

        if let Some(index) = messages.iter().position(|m| !m.is_bound()) {
            return Err(DispatchError::UnboundSender { index });
        }

        self.state = DispatchState::Sending;
        info!("sending {} messages", messages.len());

        let mut report = DispatchReport::default();

        for message in messages {
            if let Some(rest) = self.pacing.rest_after(run.attempted()) {
                debug!("resting {rest:?} after {} messages", run.attempted());
                self.sink.resting(rest);
                sleep(rest).await;
            }

            let (shown, envelope) = if mode.test_mode {
                (&identity.address, vec![identity.address.clone()])
            } else {
                (message.to(), message.envelope_recipients())
            };

            run.record_attempt(message.to());
            report.attempted += 1;

            let result = if mode.dry_run {
                Ok(())
            } else {
                self.relay.send(message, &envelope).await
            };

            match result {
                Ok(()) => {
                    info!("sent email to {shown}");
                    run.record_success();
                    report.succeeded += 1;
                    self.sink.delivered(shown, mode.test_mode);
                }
                Err(e) => {
                    error!("failed to send email to {}: {e}", message.to());
                    self.sink.failed(shown, mode.test_mode, &e.to_string());
                }
            }
        }

        self.state = DispatchState::Completed;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use mockall::{predicate::eq, Sequence};
    use testresult::TestResult;

    use crate::domain::{
        dispatch::{
            errors::{CredentialError, RelayError},
            tests::{MockCredentialProvider, MockRelay},
            Secret,
        },
        addresses::tests::MockDomainResolver,
        letters::{BodyTemplate, LetterSpec, LoadOptions, RecipientTable},
        messages::{bind_sender, compile, CompileMode},
        progress::tests::{quiet_sink, MockProgressSink},
    };

    use super::*;

    fn provider() -> MockCredentialProvider {
        let mut provider = MockCredentialProvider::new();
        provider
            .expect_credentials()
            .returning(|| Ok(Credentials::new("B09901000", Secret::new("hunter2"))));
        provider
    }

    fn connecting_relay() -> MockRelay {
        let mut relay = MockRelay::new();
        relay.expect_connect().times(1).returning(|| Ok(()));
        relay
    }

    async fn messages(count: usize) -> TestResult<Vec<CompiledMessage>> {
        let mut resolver = MockDomainResolver::new();
        resolver.expect_resolves().returning(|_| true);

        let csv: String = std::iter::once("email,name\n".to_string())
            .chain((0..count).map(|i| format!("r{i}@x.edu,R{i}\n")))
            .collect();
        let recipients = RecipientTable::load(csv.as_bytes(), &resolver, &LoadOptions::default()).await?;
        let spec = LetterSpec {
            subject: "Hi".to_string(),
            ..LetterSpec::default()
        };

        let mut messages = compile(
            &recipients,
            &spec,
            &BodyTemplate::parse("$name"),
            "Me",
            CompileMode::All,
        )
        .await?;
        bind_sender(&mut messages, &EmailAddress::new("b09901000@ntu.edu.tw")?);

        Ok(messages)
    }

    async fn authenticated(relay: MockRelay) -> TestResult<Dispatcher<MockRelay, MockProgressSink>> {
        let mut dispatcher = Dispatcher::new(relay, Arc::new(quiet_sink()));
        dispatcher.authenticate(&provider()).await?;
        Ok(dispatcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_completes_identifier() -> TestResult {
        let mut relay = connecting_relay();
        relay.expect_authenticate().times(1).returning(|_| Ok(()));

        let dispatcher = authenticated(relay).await?;

        assert_eq!(dispatcher.state(), DispatchState::Authenticated);
        assert_eq!(
            dispatcher.identity().map(|i| i.address.as_str()),
            Some("b09901000@ntu.edu.tw")
        );

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_retries_then_gives_up() -> TestResult {
        let mut relay = connecting_relay();
        relay
            .expect_authenticate()
            .times(3)
            .returning(|_| Err(RelayError::Authentication("535 bad credentials".to_string())));
        relay.expect_send().never();

        let mut provider = MockCredentialProvider::new();
        provider
            .expect_credentials()
            .times(3)
            .returning(|| Ok(Credentials::new("b09901000", Secret::new("wrong"))));

        let mut sink = MockProgressSink::new();
        sink.expect_warn().times(3).returning(|_| ());

        let mut dispatcher = Dispatcher::new(relay, Arc::new(sink));
        let started = tokio::time::Instant::now();

        let result = dispatcher.authenticate(&provider).await;

        assert!(matches!(result, Err(DispatchError::AuthExhausted { attempts: 3 })));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(dispatcher.state(), DispatchState::Aborted);

        let mut run = DispatchRun::new();
        let result = dispatcher.dispatch(&messages(1).await?, DispatchMode::default(), &mut run).await;
        assert!(matches!(result, Err(DispatchError::NotAuthenticated)));
        assert_eq!(run.attempted(), 0);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_succeeds_on_second_attempt() -> TestResult {
        let mut relay = connecting_relay();
        let mut seq = Sequence::new();
        relay
            .expect_authenticate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RelayError::Authentication("535".to_string())));
        relay
            .expect_authenticate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let dispatcher = authenticated(relay).await?;

        assert_eq!(dispatcher.state(), DispatchState::Authenticated);

        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_fatal() {
        let mut relay = MockRelay::new();
        relay
            .expect_connect()
            .times(1)
            .returning(|| Err(RelayError::Unreachable("connection refused".to_string())));
        relay.expect_authenticate().never();

        let mut dispatcher = Dispatcher::new(relay, Arc::new(quiet_sink()));

        let result = dispatcher.authenticate(&provider()).await;

        assert!(matches!(result, Err(DispatchError::RelayUnreachable(_))));
        assert_eq!(dispatcher.state(), DispatchState::Aborted);
    }

    #[tokio::test]
    async fn test_missing_credentials_are_fatal() {
        let relay = connecting_relay();
        let mut provider = MockCredentialProvider::new();
        provider
            .expect_credentials()
            .times(1)
            .returning(|| Err(CredentialError::Missing("MAILER_PASSWORD")));

        let mut dispatcher = Dispatcher::new(relay, Arc::new(quiet_sink()));

        let result = dispatcher.authenticate(&provider).await;

        assert!(matches!(result, Err(DispatchError::Credentials(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sends_are_counted_and_batch_continues() -> TestResult {
        let mut relay = connecting_relay();
        relay.expect_authenticate().returning(|_| Ok(()));
        relay
            .expect_send()
            .times(5)
            .returning(|message, _| {
                if message.to().as_str() == "r1@x.edu" || message.to().as_str() == "r3@x.edu" {
                    Err(RelayError::SendError("550 mailbox unavailable".to_string()))
                } else {
                    Ok(())
                }
            });

        let mut dispatcher = authenticated(relay).await?;
        let mut run = DispatchRun::new();

        let report = dispatcher.dispatch(&messages(5).await?, DispatchMode::default(), &mut run).await?;

        assert_eq!(report, DispatchReport { attempted: 5, succeeded: 3 });
        assert_eq!(run.attempted() - run.succeeded(), 2);
        assert_eq!(run.recipients().len(), 5);
        assert_eq!(dispatcher.state(), DispatchState::Completed);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_sends_nothing_but_still_paces() -> TestResult {
        let mut relay = connecting_relay();
        relay.expect_authenticate().returning(|_| Ok(()));
        relay.expect_send().never();

        let mut sink = MockProgressSink::new();
        sink.expect_delivered().times(25).returning(|_, _| ());
        sink.expect_resting()
            .with(eq(Duration::from_secs(10)))
            .times(2)
            .returning(|_| ());

        let mut dispatcher = Dispatcher::new(relay, Arc::new(sink));
        dispatcher.authenticate(&provider()).await?;

        let mut run = DispatchRun::new();
        let mode = DispatchMode {
            dry_run: true,
            ..DispatchMode::default()
        };
        let started = tokio::time::Instant::now();

        let report = dispatcher.dispatch(&messages(25).await?, mode, &mut run).await?;

        assert_eq!(report, DispatchReport { attempted: 25, succeeded: 25 });
        assert_eq!(run.attempted(), 25);
        assert_eq!(run.succeeded(), 25);
        assert_eq!(run.recipients().len(), 25);
        assert!(run.recipients().contains(&EmailAddress::new("r24@x.edu")?));
        assert_eq!(started.elapsed(), Duration::from_secs(20));

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_mode_redirects_envelope_to_sender() -> TestResult {
        let mut relay = connecting_relay();
        relay.expect_authenticate().returning(|_| Ok(()));
        relay
            .expect_send()
            .withf(|message, recipients| {
                message.to().as_str() == "r0@x.edu"
                    && recipients.len() == 1
                    && recipients[0].as_str() == "b09901000@ntu.edu.tw"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut sink = MockProgressSink::new();
        sink.expect_delivered()
            .withf(|recipient, to_self| recipient.as_str() == "b09901000@ntu.edu.tw" && *to_self)
            .times(1)
            .returning(|_, _| ());

        let mut dispatcher = Dispatcher::new(relay, Arc::new(sink));
        dispatcher.authenticate(&provider()).await?;

        let mut run = DispatchRun::new();
        let mode = DispatchMode {
            test_mode: true,
            ..DispatchMode::default()
        };

        dispatcher.dispatch(&messages(1).await?, mode, &mut run).await?;

        assert_eq!(
            run.recipients().iter().map(EmailAddress::as_str).collect::<Vec<_>>(),
            vec!["r0@x.edu"]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_test_mode_failure_is_reported_as_to_self() -> TestResult {
        let mut relay = connecting_relay();
        relay.expect_authenticate().returning(|_| Ok(()));
        relay
            .expect_send()
            .returning(|_, _| Err(RelayError::SendError("552 mailbox full".to_string())));

        let mut sink = MockProgressSink::new();
        sink.expect_delivered().never();
        sink.expect_failed()
            .withf(|recipient, to_self, reason| {
                recipient.as_str() == "b09901000@ntu.edu.tw" && *to_self && reason.contains("552")
            })
            .times(1)
            .returning(|_, _, _| ());

        let mut dispatcher = Dispatcher::new(relay, Arc::new(sink));
        dispatcher.authenticate(&provider()).await?;

        let mut run = DispatchRun::new();
        let mode = DispatchMode {
            test_mode: true,
            ..DispatchMode::default()
        };

        let report = dispatcher.dispatch(&messages(1).await?, mode, &mut run).await?;

        assert_eq!(report, DispatchReport { attempted: 1, succeeded: 0 });

        Ok(())
    }

    #[tokio::test]
    async fn test_unbound_messages_are_refused() -> TestResult {
        let mut relay = connecting_relay();
        relay.expect_authenticate().returning(|_| Ok(()));
        relay.expect_send().never();

        let mut dispatcher = authenticated(relay).await?;

        let mut resolver = MockDomainResolver::new();
        resolver.expect_resolves().returning(|_| true);
        let recipients =
            RecipientTable::load("email,name\na@x.edu,A\n".as_bytes(), &resolver, &LoadOptions::default())
                .await?;
        let unbound = compile(
            &recipients,
            &LetterSpec::default(),
            &BodyTemplate::parse("$name"),
            "Me",
            CompileMode::All,
        )
        .await?;

        let mut batch = messages(2).await?;
        batch.extend(unbound);
        let mut run = DispatchRun::new();

        let result = dispatcher.dispatch(&batch, DispatchMode::default(), &mut run).await;

        assert!(matches!(result, Err(DispatchError::UnboundSender { index: 2 })));
        assert_eq!(run.attempted(), 0);

        Ok(())
    }
}
