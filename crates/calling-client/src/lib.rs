//! Calling service orchestration client.
//!
//! Drives remote simulated calling clients ("instances") behind a sharded,
//! load-balanced HTTP control plane:
//!
//! - [`CallingServiceClient::create_instance`] starts an instance and binds it
//!   to the shard that created it through the load balancer's sticky cookie
//! - call operations ([`CallingServiceClient::start_call`],
//!   [`CallingServiceClient::mute_microphone`], ...) reuse that binding
//! - [`CallingServiceClient::destroy_instance`] tears the instance down and
//!   releases the binding
//! - [`CallingServiceClient::get_all_running_instances`] discovers instances
//!   on every shard, binding the ones this client did not create
//!
//! All operations are `async` and run on the caller's task. Failures are
//! returned immediately; nothing is retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use calling_client::{CallingServiceClient, ClientConfig};
//! use calling_client::models::{InstanceRequest, VersionedInstanceType};
//! use common::secret::SecretString;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let client = CallingServiceClient::new(&config)?;
//!
//! let request = InstanceRequest::new(
//!     "alice@example.com",
//!     SecretString::from("password"),
//!     VersionedInstanceType::parse("chrome")?,
//!     "Android: 1:1 call",
//! );
//! let instance = client.create_instance(&request).await?;
//! let call = client.call_to_user(&instance, "conversation-id").await?;
//! client.stop_call(&instance, &call).await?;
//! client.destroy_instance(&instance).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod affinity;
pub mod calls;
pub mod client;
pub mod config;
pub mod errors;
pub mod fleet;
pub mod instances;
pub mod models;
pub mod polling;
pub mod transport;

pub use affinity::{AffinityStore, StickyCookie};
pub use calls::escape_participant_name;
pub use client::CallingServiceClient;
pub use config::{ClientConfig, ConfigError};
pub use errors::{CallError, HttpError, InstanceError};
pub use fleet::{SweepFailure, SweepReport};
pub use polling::{wait_for_call_status, wait_for_instance_status, PollSettings, WaitError};
