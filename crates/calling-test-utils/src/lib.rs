//! # Calling Test Utilities
//!
//! Shared test utilities for the calling service client.
//!
//! This crate provides:
//! - `mock_service` - a `wiremock` calling service with sticky-cookie routing
//! - `fixtures` - JSON documents in the service's wire format
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calling_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let mock = MockCallingService::start().await;
//!     mock.mount_instance_get("abc123", "status", instance_json("abc123", "STARTED"))
//!         .await;
//!
//!     let client = mock.client();
//!     // Run your test...
//! }
//! ```

pub mod fixtures;
pub mod mock_service;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_service::*;
