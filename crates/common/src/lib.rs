//! Common utilities and types shared across the calling harness crates.

#![warn(clippy::pedantic)]

/// Module for common configuration
pub mod config;

/// Module for tracing subscriber setup
pub mod observability;

/// Module for secret types that prevent accidental logging
pub mod secret;
