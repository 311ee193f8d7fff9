use super::{NotifierError, OperatorNotifier};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SMTP relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// Relay host name.
    pub host: String,
    /// Relay port (465 for implicit TLS, 587 for STARTTLS).
    pub port: u16,
    /// Login, if the relay requires authentication.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<String>,
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
}

/// Notifier that e-mails alerts to the operators.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("to", &self.to.len())
            .finish_non_exhaustive()
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifierError> {
    address
        .parse()
        .map_err(|e| NotifierError::Configuration(format!("invalid address '{address}': {e}")))
}

impl SmtpNotifier {
    /// Builds a notifier from relay settings.
    ///
    /// No connection is opened until the first alert.
    ///
    /// # Errors
    ///
    /// Returns `NotifierError::Configuration` for an invalid address, an
    /// empty recipient list, or a relay that cannot be set up.
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifierError> {
        let from = mailbox(&settings.from)?;
        let to = settings
            .to
            .iter()
            .map(|address| mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifierError::Configuration(
                "at least one recipient is required".to_string(),
            ));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| NotifierError::Configuration(e.to_string()))?
            .port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message, NotifierError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifierError::Message(e.to_string()))
    }
}

#[async_trait]
impl OperatorNotifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifierError> {
        let message = self.message(subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifierError::Delivery(e.to_string()))?;
        tracing::info!(subject, recipients = self.to.len(), "operator alert e-mailed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: Some("alerts".to_string()),
            password: Some("secret".to_string()),
            from: "Batch <batch@example.com>".to_string(),
            to: vec!["ops@example.com".to_string(), "oncall@example.com".to_string()],
        }
    }

    #[tokio::test]
    async fn builds_message_for_every_recipient() {
        let notifier = SmtpNotifier::new(&settings()).unwrap();
        let message = notifier.message("job failed", "3 attempts").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: job failed"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("oncall@example.com"));
    }

    #[tokio::test]
    async fn rejects_invalid_address() {
        let mut bad = settings();
        bad.to = vec!["not an address".to_string()];
        assert!(matches!(
            SmtpNotifier::new(&bad),
            Err(NotifierError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn requires_recipient() {
        let mut bad = settings();
        bad.to.clear();
        assert!(SmtpNotifier::new(&bad).is_err());
    }
}
