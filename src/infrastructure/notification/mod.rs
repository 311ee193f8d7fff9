//! # Operator Notification
//!
//! Escalation channel for batch failures that exhausted their retries.
//!
//! - [`LogNotifier`]: writes the alert to the log (default)
//! - [`SmtpNotifier`]: sends the alert by e-mail through `lettre`

mod log_notifier;
mod smtp;

pub use log_notifier::LogNotifier;
pub use smtp::{SmtpNotifier, SmtpSettings};

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Notification delivery failure.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// The notifier is misconfigured.
    #[error("notifier configuration error: {0}")]
    Configuration(String),

    /// The message could not be built.
    #[error("invalid notification: {0}")]
    Message(String),

    /// The transport rejected or failed to deliver the message.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Receives alerts that need human attention.
#[async_trait]
pub trait OperatorNotifier: Send + Sync + fmt::Debug {
    /// Delivers one alert.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifierError`] when delivery fails.
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifierError>;
}
