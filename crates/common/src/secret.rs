//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types for
//! every credential the harness handles: the calling service basic-auth
//! password and the account passwords sent when creating instances.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one is safe to log via `{:?}` or tracing fields.
//! Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BasicAuth {
//!     user: String,
//!     password: SecretString,
//! }
//!
//! let auth = BasicAuth {
//!     user: "qa".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! // Password is redacted
//! println!("{:?}", auth);
//!
//! // Access requires an explicit call
//! let password: &str = auth.password.expose_secret();
//! assert_eq!(password, "hunter2");
//! ```
//!
//! # Serialization
//!
//! `SecretString` deliberately does not implement `Serialize`. Request bodies
//! that must carry a secret on the wire use [`serialize_exposed`] as a
//! `serialize_with` hook, which keeps the exposure visible at the field
//! declaration.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Serialize a secret by exposing its value.
///
/// Intended for `#[serde(serialize_with = "common::secret::serialize_exposed")]`
/// on request fields that the remote API requires in clear text.
///
/// # Errors
///
/// Propagates the serializer's error.
pub fn serialize_exposed<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}
