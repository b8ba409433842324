use std::{sync::Arc, time::Duration};

use missive_common::outgoing;
use missive_spool::MessageRecord;

use crate::{
    control::DeliveryControl,
    error::DispatchError,
    transport::{MailTransport, OutboundMessage},
};

/// What happened to a record that left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Handed to the mail transport
    Sent,
    /// Consumed without sending because delivery is switched off
    Discarded,
}

/// Sends one queued record through the mail transport
#[derive(Debug, Clone)]
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
    control: Arc<DeliveryControl>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        control: Arc<DeliveryControl>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            control,
            timeout,
        }
    }

    pub fn control(&self) -> &Arc<DeliveryControl> {
        &self.control
    }

    /// Dispatch `record`, reporting why it was not sent
    ///
    /// # Errors
    /// - [`DispatchError::MissingSender`] / [`DispatchError::Recipient`] if the
    ///   record cannot be turned into a message
    /// - [`DispatchError::Transport`] if the transport refused it
    /// - [`DispatchError::Timeout`] if the transport did not answer in time
    pub async fn try_send(&self, record: &MessageRecord) -> Result<Dispatched, DispatchError> {
        if !self.control.is_enabled() {
            self.control.record_discard();
            return Ok(Dispatched::Discarded);
        }

        let message = OutboundMessage::from_record(record)?;

        tokio::time::timeout(self.timeout, self.transport.send_message(&message))
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout))??;

        Ok(Dispatched::Sent)
    }

    /// Dispatch `record`; `true` if it may be removed from the queue
    pub async fn send(&self, record: &MessageRecord) -> bool {
        match self.try_send(record).await {
            Ok(Dispatched::Sent) => {
                outgoing!(
                    level = DEBUG,
                    plugin = %record.plugin_id,
                    to = %record.to,
                    id = %record.id_display(),
                    transport = self.transport.name(),
                    "Notification sent"
                );
                true
            }
            Ok(Dispatched::Discarded) => {
                outgoing!(
                    level = DEBUG,
                    plugin = %record.plugin_id,
                    to = %record.to,
                    id = %record.id_display(),
                    "Delivery is switched off, notification discarded"
                );
                true
            }
            Err(e) => {
                outgoing!(
                    level = WARN,
                    plugin = %record.plugin_id,
                    to = %record.to,
                    id = %record.id_display(),
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to send notification"
                );
                false
            }
        }
    }
}
