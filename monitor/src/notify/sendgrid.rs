use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use shared_models::NotificationSink;
use tracing::{error, info};

const SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridSink {
    client: Client,
    api_key: String,
    from: String,
}

impl SendGridSink {
    pub fn new(client: Client, api_key: String, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
        }
    }

    fn payload(&self, to: &str, subject: &str, html_body: &str, text_body: &str) -> serde_json::Value {
        json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": self.from},
            "subject": subject,
            "content": [
                {"type": "text/plain", "value": text_body},
                {"type": "text/html", "value": html_body}
            ]
        })
    }
}

#[async_trait]
impl NotificationSink for SendGridSink {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str, text_body: &str) -> bool {
        let result = self
            .client
            .post(SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&self.payload(to, subject, html_body, text_body))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(%to, "📧 Email sent via SendGrid");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(%to, %status, %body, "SendGrid rejected the message");
                false
            }
            Err(e) => {
                error!(%to, error = %e, "Failed to reach SendGrid");
                false
            }
        }
    }
}
