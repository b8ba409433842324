use async_trait::async_trait;
use missive_common::outgoing;

use super::{MailTransport, OutboundMessage};
use crate::error::TransportError;

/// Logs notifications instead of sending them, for development setups
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        outgoing!(
            level = INFO,
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            body_len = message.body.len(),
            "Notification logged in place of delivery"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
