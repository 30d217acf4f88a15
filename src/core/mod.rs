//! Core types for updatectl
//!
//! This module holds the error vocabulary shared by every update component.
//!
//! # Error Management
//!
//! - **Strongly-typed errors** ([`UpdateError`]) for the orchestrator, which
//!   maps each variant onto the sub-state of the channel that produced it
//! - **User-friendly contexts** ([`ErrorContext`]) with remediation text for CLI users
//! - **Channel classification** ([`ErrorChannel`]) so a failure in one update
//!   channel is never recorded against another
//!
//! # Example
//!
//! ```rust
//! use updatectl::core::{ErrorChannel, UpdateError};
//!
//! let err = UpdateError::OtaFetch { reason: "timeout".to_string() };
//! assert_eq!(err.channel(), ErrorChannel::Bundle);
//! assert!(err.is_retryable());
//! ```

pub mod error;

pub use error::{ErrorChannel, ErrorContext, UpdateError, user_friendly_error};
