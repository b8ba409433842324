use std::{collections::BTreeSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MailTransport, OutboundMessage};
use crate::error::TransportError;

#[derive(Debug, Default)]
struct Behaviour {
    fail_all: bool,
    failing_recipients: BTreeSet<String>,
    delay: Option<Duration>,
}

/// Transport that keeps every message it is given, for tests
///
/// It can be told to fail every send, to fail sends to particular recipients,
/// or to stall before answering.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    behaviour: Arc<Mutex<Behaviour>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far, in send order
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Subjects of the accepted messages, in send order
    pub async fn sent_subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|message| message.subject.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn fail_all(&self, fail: bool) {
        self.behaviour.lock().await.fail_all = fail;
    }

    /// Fail every message addressed to `recipient`
    pub async fn fail_recipient(&self, recipient: impl Into<String>) {
        self.behaviour
            .lock()
            .await
            .failing_recipients
            .insert(recipient.into());
    }

    pub async fn clear_failures(&self) {
        let mut behaviour = self.behaviour.lock().await;
        behaviour.fail_all = false;
        behaviour.failing_recipients.clear();
    }

    /// Wait `delay` before answering each send
    pub async fn delay(&self, delay: Duration) {
        self.behaviour.lock().await.delay = Some(delay);
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let (fail, delay) = {
            let behaviour = self.behaviour.lock().await;
            let fail = behaviour.fail_all
                || message
                    .to
                    .iter()
                    .any(|recipient| behaviour.failing_recipients.contains(recipient));
            (fail, behaviour.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(TransportError::Unavailable(format!(
                "refusing message to {:?}",
                message.to
            )));
        }

        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
