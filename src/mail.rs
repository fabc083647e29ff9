use async_trait::async_trait;
use thiserror::Error;

use crate::invoice::Invoice;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Delivery that writes each message to the tracing pipeline.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            body = %email.html,
            "email dispatched"
        );
        Ok(())
    }
}

pub fn verification_email(to: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Email verification".into(),
        html: format!(
            "<h2>Please verify your email</h2>\
             <p><a href=\"{link}\">Verify account</a></p>\
             <p>The link expires in one hour.</p>"
        ),
        attachments: Vec::new(),
    }
}

pub fn password_reset_email(to: &str, token: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Reset password".into(),
        html: format!(
            "<h2>Password reset requested</h2>\
             <p>Use this token to reset your password: <code>{token}</code></p>\
             <p>It expires in 15 minutes.</p>"
        ),
        attachments: Vec::new(),
    }
}

pub fn order_confirmation_email(to: &str, invoice: &Invoice) -> Email {
    Email {
        to: to.to_string(),
        subject: "Order confirmation".into(),
        html: format!(
            "<h2>Thanks for your order</h2><p>Order {} has been placed. Your invoice is attached.</p>",
            invoice.order_id
        ),
        attachments: vec![Attachment {
            file_name: invoice.file_name(),
            content_type: "text/plain; charset=utf-8".into(),
            body: invoice.render().into_bytes(),
        }],
    }
}
