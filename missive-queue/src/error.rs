//! Typed errors for queueing and delivering notifications.
//!
//! None of these are fatal to the queue:
//! - [`EnqueueError`] rejects a single notification before or while it is stored
//! - [`DispatchError`] leaves a record queued for the next cycle
//! - [`TransportError`] is what a mail transport reports back to the dispatcher

use std::time::Duration;

use missive_common::address::AddressError;
use missive_spool::SpoolError;
use thiserror::Error;

/// Why a notification was not accepted into the queue.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The recipient list is empty or holds an invalid address.
    #[error("Invalid recipient: {0}")]
    Validation(#[from] AddressError),

    /// The store could not persist the record.
    #[error("Unable to persist notification: {0}")]
    Persistence(#[from] SpoolError),
}

/// Why a queued record was not handed to the mail transport.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Notification has no sender")]
    MissingSender,

    #[error("Invalid recipient: {0}")]
    Recipient(#[from] AddressError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Transport did not answer within {0:?}")]
    Timeout(Duration),
}

/// Failures reported by a [`crate::transport::MailTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Unable to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The transport is not able to take messages right now.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl EnqueueError {
    /// Validation failures never succeed on a second attempt; persistence may.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl DispatchError {
    /// Returns `true` if a later cycle could deliver the record.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MissingSender | Self::Recipient(_) => false,
            Self::Transport(e) => e.is_retryable(),
            Self::Timeout(_) => true,
        }
    }
}

impl TransportError {
    /// Returns `true` unless the server or the message itself rejected delivery.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Address(_) | Self::Build(_) => false,
            Self::Smtp(e) => !e.is_permanent(),
            Self::Unavailable(_) => true,
        }
    }
}
