use crate::config::SmtpSettings;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use shared_models::error::{ModelError, Result};
use shared_models::NotificationSink;
use tracing::{error, info};

/// STARTTLS relay. Serves both plain SMTP accounts and the SES SMTP interface.
pub struct SmtpSink {
    name: &'static str,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpSink {
    pub fn new(name: &'static str, settings: &SmtpSettings) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| ModelError::Notification(format!("SMTP relay error: {}", e)))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            name,
            transport,
            from: settings.from.clone(),
        })
    }
}

pub(crate) fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    html_body: &str,
    text_body: &str,
) -> Result<Message> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| ModelError::Notification(format!("invalid from address: {}", e)))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| ModelError::Notification(format!("invalid to address: {}", e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(MultiPart::alternative_plain_html(
            text_body.to_string(),
            html_body.to_string(),
        ))
        .map_err(|e| ModelError::Notification(format!("failed to build email: {}", e)))
}

#[async_trait]
impl NotificationSink for SmtpSink {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str, text_body: &str) -> bool {
        let message = match build_message(&self.from, to, subject, html_body, text_body) {
            Ok(message) => message,
            Err(e) => {
                error!(provider = self.name, error = %e, "Could not build email");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(provider = self.name, %to, "📧 Email sent");
                true
            }
            Err(e) => {
                error!(provider = self.name, %to, error = %e, "SMTP send failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_multipart_message() {
        let message = build_message("a@example.com", "b@example.com", "s", "<p>x</p>", "x").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Subject: s"));
    }

    #[test]
    fn rejects_invalid_recipient() {
        assert!(build_message("a@example.com", "not an address", "s", "h", "t").is_err());
    }
}
