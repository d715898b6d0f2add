#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Sends a letter directory to every recipient and reports bounces

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use letter_mailer::{
    domain::{
        addresses::DEFAULT_DOMAIN,
        campaign::{Campaign, CampaignOptions},
        dispatch::{DispatchMode, Dispatcher},
        letters::{Letter, LoadOptions},
        reconciliation::BounceReconciler,
        validation::ValidationMode,
    },
    infrastructure::{
        config::MailerConfig,
        console::ConsoleSink,
        credentials::EnvCredentials,
        dns::HickoryResolver,
        email::{pop3::Pop3Mailbox, smtp::SmtpRelay},
    },
};
use tracing::Level;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Only print failures and the summary
    #[clap(short, long, global = true)]
    pub quiet: bool,

    /// Stop at the first validation problem instead of listing them all
    #[clap(long, global = true)]
    pub fail_fast: bool,

    /// What to do
    #[clap(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a letter
    Send(SendArgs),

    /// Validate a letter without sending anything
    Check(CheckArgs),
}

/// Arguments of `send`
#[derive(Debug, Args)]
pub struct SendArgs {
    /// The letter directory
    pub letter: PathBuf,

    /// Send only the first message, to yourself
    #[clap(short, long)]
    pub test: bool,

    /// Go through every step without transmitting anything
    #[clap(long)]
    pub dry_run: bool,

    /// Print the final report as JSON
    #[clap(long)]
    pub json: bool,

    /// DNS lookup timeout for recipient domains, in seconds
    #[clap(long, env = "MAILER_DNS_TIMEOUT", default_value_t = 5)]
    pub dns_timeout: u64,

    /// Relay, mailbox and account configuration
    #[clap(flatten)]
    pub config: MailerConfig,
}

/// Arguments of `check`
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// The letter directory
    pub letter: PathBuf,

    /// Domain appended to addresses written without one
    #[clap(long, env = "MAILER_DEFAULT_DOMAIN", default_value = DEFAULT_DOMAIN)]
    pub default_domain: String,

    /// DNS lookup timeout for recipient domains, in seconds
    #[clap(long, env = "MAILER_DNS_TIMEOUT", default_value_t = 5)]
    pub dns_timeout: u64,
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine, everything can come from the command line
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(match cli.debug {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.fail_fast {
        ValidationMode::FailFast
    } else {
        ValidationMode::Exhaustive
    };

    match cli.command {
        Command::Send(args) => send(args, mode, cli.quiet).await,
        Command::Check(args) => check(args, mode).await,
    }
}

#[mutants::skip]
async fn send(args: SendArgs, validation_mode: ValidationMode, quiet: bool) -> Result<()> {
    let config = args.config;

    let resolver = HickoryResolver::new(Duration::from_secs(args.dns_timeout))?;
    let letter = Letter::open(
        &args.letter,
        &resolver,
        &LoadOptions {
            mode: validation_mode,
            default_domain: config.account.default_domain.clone(),
        },
    )
    .await?;

    let sink = Arc::new(ConsoleSink::new(quiet));

    let dispatcher = Dispatcher::new(SmtpRelay::new(config.relay), sink.clone())
        .with_default_domain(config.account.default_domain.clone());
    let reconciler = BounceReconciler::new(Pop3Mailbox::new(config.mailbox), sink.clone())
        .with_settle_delay(config.account.settle_delay());

    let mut campaign = Campaign::new(
        dispatcher,
        reconciler,
        Arc::new(EnvCredentials::default()),
        sink,
        CampaignOptions {
            sender_name: config.account.name,
            validation_mode,
        },
    );

    let report = campaign
        .run(
            &letter,
            DispatchMode {
                test_mode: args.test,
                dry_run: args.dry_run,
            },
        )
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[mutants::skip]
async fn check(args: CheckArgs, mode: ValidationMode) -> Result<()> {
    let resolver = HickoryResolver::new(Duration::from_secs(args.dns_timeout))?;
    let options = LoadOptions {
        mode,
        default_domain: args.default_domain,
    };

    Letter::check(&args.letter, &resolver, &options).await?;

    println!("{} is ready to send", args.letter.display());

    Ok(())
}
