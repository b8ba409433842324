use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use missive_common::outgoing;
use missive_tracing::traced;
use serde::Deserialize;

use super::{MailTransport, OutboundMessage};
use crate::error::TransportError;

const fn default_tls() -> bool {
    true
}

const fn default_timeout() -> u64 {
    30
}

/// SMTP relay settings
#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    /// Defaults to the submission port for TLS relays and 25 otherwise
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Use STARTTLS/TLS. Disable only for local relays such as Mailpit
    #[serde(default = "default_tls")]
    pub tls: bool,

    /// Connection and command timeout (in seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Delivers notifications through an SMTP relay
#[derive(Debug)]
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Configure the relay; no connection is made until the first send
    ///
    /// # Errors
    /// If the relay's TLS parameters cannot be built for `host`
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder
                .timeout(Some(Duration::from_secs(config.timeout_secs)))
                .build(),
        })
    }

    fn build_message(message: &OutboundMessage) -> Result<Message, TransportError> {
        let mut builder = Message::builder()
            .from(message.from.parse::<Mailbox>()?)
            .subject(&message.subject);

        for recipient in &message.to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }

        Ok(builder
            .header(ContentType::TEXT_HTML)
            .body(message.body.clone())?)
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all), timing(precision = "ms"))]
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let email = Self::build_message(message)?;
        let response = self.transport.send(email).await?;

        outgoing!(
            level = DEBUG,
            to = ?message.to,
            code = %response.code(),
            "Relay accepted notification"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
