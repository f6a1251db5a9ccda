//! # mail: SMTP implementation of the [`Notifier`] contract
//!
//! Sends each notification as one multipart email from
//! `"{from_name}" <SMTP_USER>` to every configured recipient, with the
//! notification's attachments as MIME parts. Implicit TLS or STARTTLS is
//! picked from the settings; there are no retries.

use async_trait::async_trait;
use fiscal_report_core::contract::{Attachment, BoxError, Notification, Notifier};
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info};

use crate::load_config::MailSettings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("invalid attachment content type: {0}")]
    ContentType(#[from] ContentTypeErr),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let smtp = &settings.smtp;
        let builder = if smtp.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        };
        let transport = builder
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .build();

        let sender: Address = smtp.user.parse()?;
        let from = Mailbox::new(Some(settings.from_name.clone()), sender);
        let recipients = settings
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            host = %smtp.host,
            port = smtp.port,
            secure = smtp.secure,
            recipients = recipients.len(),
            "SMTP notifier configured"
        );
        Ok(Self {
            transport,
            from,
            recipients,
        })
    }

    /// The email for `notification`, ready to send.
    pub fn build_message(&self, notification: Notification) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(notification.body));
        for attachment in notification.attachments {
            body = body.singlepart(mime_part(attachment)?);
        }
        Ok(builder.multipart(body)?)
    }
}

fn mime_part(attachment: Attachment) -> Result<SinglePart, MailError> {
    let content_type = match ContentType::parse(attachment.content_type_or_default()) {
        Ok(content_type) => content_type,
        Err(_) => ContentType::parse(Attachment::FALLBACK_CONTENT_TYPE)?,
    };
    debug!(filename = %attachment.filename, bytes = attachment.content.len(), "Attaching file");
    Ok(MailAttachment::new(attachment.filename).body(attachment.content, content_type))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), BoxError> {
        let attachments = notification.attachments.len();
        let message = self.build_message(notification)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(MailError::from)?;
        info!(
            attachments,
            code = %response.code(),
            "Notification email accepted by SMTP server"
        );
        Ok(())
    }
}
