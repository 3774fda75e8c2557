use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{NotificationEvent, Notifier};
use crate::config::SmtpConfig;
use crate::utils::error::NotifyError;

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from_address = config
            .from_address
            .as_deref()
            .ok_or_else(|| NotifyError::InvalidAddress("Missing from_address".to_string()))?;
        let to_address = config
            .to_address
            .as_deref()
            .ok_or_else(|| NotifyError::InvalidAddress("Missing to_address".to_string()))?;

        let from = Mailbox::new(Some(config.from_name.clone()), parse_address(from_address)?);
        let to = Mailbox::new(None, parse_address(to_address)?);

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::TransportFailure(format!("SMTP relay setup failed: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }

    fn format_html_body(&self, event: &NotificationEvent) -> String {
        let mut html = format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; margin: 20px;">
    <p>Great news! The product <strong>{}</strong> is now available!</p>
    <p>You can find it here: <a href="{}">{}</a></p>
"#,
            event.target_name, event.url, event.url
        );

        if let Some(image_url) = &event.image_url {
            html.push_str(&format!(
                "    <p><img src=\"{}\" alt=\"{}\" style=\"max-width: 320px;\"></p>\n",
                image_url, event.target_name
            ));
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    pub fn build_message(&self, event: &NotificationEvent) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(event.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(event.text_body()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(self.format_html_body(event)),
                    ),
            )
            .map_err(|e| NotifyError::TransportFailure(format!("Failed to build email: {}", e)))
    }
}

fn parse_address(raw: &str) -> Result<Address, NotifyError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| NotifyError::InvalidAddress(format!("{}: {}", raw, e)))
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let message = self.build_message(event)?;
        debug!(to = %self.to, "Sending restock email");

        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::TransportFailure(e.to_string()))?;

        info!(
            target_id = %event.target_id,
            code = %response.code(),
            "Restock email sent"
        );
        Ok(())
    }
}
