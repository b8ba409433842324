//! Mail transports the dispatcher hands notifications to

mod log;
mod recording;
mod smtp;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use missive_common::address::validate_address_list;
use missive_spool::MessageRecord;
use serde::Deserialize;

pub use self::{
    log::LogTransport,
    recording::RecordingTransport,
    smtp::{SmtpConfig, SmtpTransport},
};
use crate::error::{DispatchError, TransportError};

/// A notification ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    /// HTML body, with the footer appended
    pub body: String,
}

impl OutboundMessage {
    /// Build the outbound form of a queued record
    ///
    /// # Errors
    /// - [`DispatchError::MissingSender`] if the record has no sender
    /// - [`DispatchError::Recipient`] if the recipient list does not validate
    pub fn from_record(record: &MessageRecord) -> Result<Self, DispatchError> {
        if record.from.trim().is_empty() {
            return Err(DispatchError::MissingSender);
        }

        let body = if record.footer.is_empty() {
            record.body.clone()
        } else {
            format!("{}{}", record.body, record.footer)
        };

        Ok(Self {
            from: record.from.clone(),
            to: validate_address_list(&record.to)?,
            subject: record.subject.clone(),
            body,
        })
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync + Debug {
    /// Deliver one message
    ///
    /// # Errors
    /// Any failure to hand the message over. The dispatcher treats every error
    /// as "not sent" and leaves the record queued.
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), TransportError>;

    fn name(&self) -> &'static str;
}

/// Which transport delivers notifications
///
/// ```ron
/// transport: Smtp((
///     host: "smtp.example.com",
///     port: Some(587),
///     username: "notifications",
///     password: "secret",
/// )),
/// ```
///
/// or, to only log what would have been sent:
/// ```ron
/// transport: Log,
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub enum TransportConfig {
    Smtp(SmtpConfig),
    #[default]
    Log,
}

impl TransportConfig {
    /// Build the configured transport
    ///
    /// # Errors
    /// If the SMTP relay cannot be configured
    pub fn build(self) -> Result<Arc<dyn MailTransport>, TransportError> {
        Ok(match self {
            Self::Smtp(config) => Arc::new(SmtpTransport::new(&config)?),
            Self::Log => Arc::new(LogTransport),
        })
    }
}
