use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailSettings;
use crate::metrics::MAIL_RELAY_TOTAL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

/// Best-effort outbound mail. One call, one attempt; no retries.
#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

pub struct SmtpMailRelay {
    settings: Option<EmailSettings>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailRelay {
    pub fn new(settings: Option<EmailSettings>) -> Result<Self> {
        let transport = settings.as_ref().map(build_mailer).transpose()?;
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn sending_disabled() -> bool {
        std::env::var("EMAIL_SEND_DISABLED")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn build_message(settings: &EmailSettings, mail: &OutgoingMail) -> Result<Message> {
        let from_address: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .context("Invalid from email address")?;
        let to_address: Mailbox = mail.to.parse().context("Invalid recipient email address")?;

        let mut builder = Message::builder()
            .from(from_address)
            .to(to_address)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_HTML);

        if let Some(reply_to) = &mail.reply_to {
            let reply_to: Mailbox = reply_to.parse().context("Invalid reply-to address")?;
            builder = builder.reply_to(reply_to);
        }

        builder
            .body(mail.html.clone())
            .context("Failed to build email message")
    }
}

#[async_trait]
impl MailRelay for SmtpMailRelay {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let (Some(settings), Some(transport)) = (&self.settings, &self.transport) else {
            tracing::info!(to = %mail.to, subject = %mail.subject, "SMTP not configured, mail logged only");
            MAIL_RELAY_TOTAL.with_label_values(&["logged"]).inc();
            return Ok(());
        };

        if Self::sending_disabled() {
            tracing::info!(to = %mail.to, subject = %mail.subject, "Email sending disabled, mail logged only");
            MAIL_RELAY_TOTAL.with_label_values(&["logged"]).inc();
            return Ok(());
        }

        let message = Self::build_message(settings, &mail)?;
        match transport.send(message).await {
            Ok(_) => {
                MAIL_RELAY_TOTAL.with_label_values(&["sent"]).inc();
                Ok(())
            }
            Err(e) => {
                MAIL_RELAY_TOTAL.with_label_values(&["failed"]).inc();
                Err(e).context("Failed to send email")
            }
        }
    }
}

fn build_mailer(settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let creds = Credentials::new(settings.login.clone(), settings.password.clone());

    let builder = if settings.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
            .context("Invalid SMTP server for TLS")?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
    }
    .port(settings.port)
    .credentials(creds);

    Ok(builder.build())
}

/// Escapes user text before it is placed into an HTML mail body.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
