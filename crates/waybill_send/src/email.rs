//! Email delivery backend (SMTP with the output file attached).

use crate::{Result, SendBackend, SendError};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use std::path::Path;

/// SMTP parameters from settings plus the folder's recipient list.
#[derive(Debug, Clone)]
pub struct EmailParams {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from: String,
    /// Comma-separated recipient list.
    pub to: String,
    pub subject: String,
}

/// Sends the output file as an attachment to the configured recipients.
pub struct EmailBackend {
    params: EmailParams,
    output_name: String,
}

impl EmailBackend {
    pub fn new(params: EmailParams, output_name: impl Into<String>) -> Self {
        Self {
            params,
            output_name: output_name.into(),
        }
    }

    fn build_message(&self, file: &Path) -> Result<Message> {
        let from: Mailbox = self.params.from.parse()?;
        let mut builder = Message::builder().from(from).subject(&self.params.subject);
        for recipient in self.params.to.split(',') {
            let recipient = recipient.trim();
            if recipient.is_empty() {
                continue;
            }
            builder = builder.to(recipient.parse()?);
        }

        let content = fs::read(file)?;
        let content_type = ContentType::parse("application/octet-stream")
            .map_err(|e| SendError::Config(format!("bad attachment content type: {e}")))?;
        let attachment = Attachment::new(self.output_name.clone()).body(content, content_type);

        let body = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(format!("Attached: {}\r\n", self.output_name));
        let message = builder.multipart(MultiPart::mixed().singlepart(body).singlepart(attachment))?;
        Ok(message)
    }
}

impl SendBackend for EmailBackend {
    fn name(&self) -> &'static str {
        "email"
    }

    fn destination(&self) -> String {
        self.params.to.clone()
    }

    fn uses_backoff(&self) -> bool {
        true
    }

    fn send_once(&self, file: &Path) -> Result<()> {
        if self.params.smtp_host.is_empty() {
            return Err(SendError::Config("SMTP server not configured".to_string()));
        }
        if self.params.to.trim().is_empty() {
            return Err(SendError::Config("no email recipients configured".to_string()));
        }

        let message = self.build_message(file)?;
        // Plain relay; the internal mail host does not speak TLS.
        let mailer = SmtpTransport::builder_dangerous(&self.params.smtp_host)
            .port(self.params.smtp_port)
            .build();
        mailer.send(&message)?;
        Ok(())
    }
}
