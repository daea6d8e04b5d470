pub mod email;
pub mod sendgrid;
pub mod smtp;

pub use email::format_alert_email;
pub use sendgrid::SendGridSink;
pub use smtp::SmtpSink;

use crate::config::Credentials;
use crate::sources::http_client;
use shared_models::error::Result;
use shared_models::{NotificationSink, TrendAlert};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    SendGrid,
    Ses,
    Smtp,
}

/// First configured email provider, in preference order.
pub fn probe_notifier(credentials: &Credentials) -> Option<NotifierKind> {
    const PROBES: [(NotifierKind, fn(&Credentials) -> bool); 3] = [
        (NotifierKind::SendGrid, has_sendgrid),
        (NotifierKind::Ses, has_ses),
        (NotifierKind::Smtp, has_smtp),
    ];
    PROBES
        .iter()
        .find(|(_, available)| available(credentials))
        .map(|(kind, _)| *kind)
}

fn has_sendgrid(credentials: &Credentials) -> bool {
    credentials.sendgrid_api_key.is_some()
}

fn has_ses(credentials: &Credentials) -> bool {
    credentials.ses_smtp.is_some()
}

fn has_smtp(credentials: &Credentials) -> bool {
    credentials.smtp.is_some()
}

/// `Ok(None)` when no provider is configured; notifications are then skipped.
pub fn build_notifier(credentials: &Credentials) -> Result<Option<Arc<dyn NotificationSink>>> {
    let sink: Arc<dyn NotificationSink> = match probe_notifier(credentials) {
        Some(NotifierKind::SendGrid) => Arc::new(SendGridSink::new(
            http_client()?.clone(),
            credentials.sendgrid_api_key.clone().unwrap_or_default(),
            credentials.sendgrid_from.clone(),
        )),
        Some(NotifierKind::Ses) => match &credentials.ses_smtp {
            Some(settings) => Arc::new(SmtpSink::new("ses", settings)?),
            None => return Ok(None),
        },
        Some(NotifierKind::Smtp) => match &credentials.smtp {
            Some(settings) => Arc::new(SmtpSink::new("smtp", settings)?),
            None => return Ok(None),
        },
        None => return Ok(None),
    };
    info!(provider = sink.name(), "Email notifier ready");
    Ok(Some(sink))
}

/// Formats and sends `alerts`. An empty batch counts as delivered.
pub async fn send_alert_notification(
    sink: &dyn NotificationSink,
    alerts: &[TrendAlert],
    to: &str,
) -> bool {
    if alerts.is_empty() {
        info!("No alerts to send");
        return true;
    }

    let (subject, html, text) = format_alert_email(alerts);
    let sent = sink.send(to, &subject, &html, &text).await;
    if !sent {
        warn!(provider = sink.name(), %to, "Alert notification was not delivered");
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpSettings;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn smtp_settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            username: "u".into(),
            password: "p".into(),
            from: "u@example.com".into(),
        }
    }

    #[test]
    fn sendgrid_wins_over_ses_and_smtp() {
        let credentials = Credentials {
            sendgrid_api_key: Some("k".into()),
            ses_smtp: Some(smtp_settings()),
            smtp: Some(smtp_settings()),
            ..Credentials::default()
        };
        assert_eq!(probe_notifier(&credentials), Some(NotifierKind::SendGrid));
    }

    #[test]
    fn ses_wins_over_plain_smtp() {
        let credentials = Credentials {
            ses_smtp: Some(smtp_settings()),
            smtp: Some(smtp_settings()),
            ..Credentials::default()
        };
        assert_eq!(probe_notifier(&credentials), Some(NotifierKind::Ses));
    }

    #[test]
    fn nothing_configured_means_no_notifier() {
        assert_eq!(probe_notifier(&Credentials::default()), None);
        assert!(build_notifier(&Credentials::default()).unwrap().is_none());
    }

    #[derive(Default)]
    struct RecordingSink {
        subjects: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, _to: &str, subject: &str, _html: &str, _text: &str) -> bool {
            self.subjects.lock().unwrap().push(subject.to_string());
            true
        }
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let sink = RecordingSink::default();
        assert!(send_alert_notification(&sink, &[], "to@example.com").await);
        assert!(sink.subjects.lock().unwrap().is_empty());
    }
}
