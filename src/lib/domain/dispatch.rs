//! Dispatch module.
//!
//! Sends compiled messages through a [`Relay`] one at a time, resting
//! between messages according to a [`PacingPolicy`] and accounting every
//! attempt into a [`DispatchRun`].

mod credentials;
mod engine;
mod pacing;
mod relay;
mod run;

pub mod errors;

pub use credentials::{CredentialProvider, Credentials, Secret};
pub use engine::{AuthRetry, DispatchMode, DispatchState, Dispatcher, Identity};
pub use pacing::PacingPolicy;
pub use relay::Relay;
pub use run::{DispatchReport, DispatchRun};
