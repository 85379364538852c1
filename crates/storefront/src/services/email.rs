//! Email delivery over SMTP.
//!
//! Uses lettre's async SMTP transport. Bodies are rendered ahead of time
//! (see [`super::notifications`]) and sent as multipart text + HTML.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Delivery refused by a test double.
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Something that can deliver an [`OutgoingEmail`].
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one email.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the message is invalid or delivery fails.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = build_message(&self.from_address, email)?;
        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Build a multipart message with both plain text and HTML versions.
fn build_message(from: &str, email: &OutgoingEmail) -> Result<Message, EmailError> {
    Ok(Message::builder()
        .from(
            from.parse()
                .map_err(|_| EmailError::InvalidAddress(from.to_string()))?,
        )
        .to(email
            .to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
        .subject(&email.subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.text_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.html_body.clone()),
                ),
        )?)
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::RecordingMailer;

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use async_trait::async_trait;

    use super::{EmailError, Mailer, OutgoingEmail};

    #[derive(Default)]
    struct Inner {
        sent: Vec<OutgoingEmail>,
        failures_left: u32,
    }

    /// [`Mailer`] that keeps sent emails in memory.
    #[derive(Default)]
    pub struct RecordingMailer {
        inner: Mutex<Inner>,
    }

    impl RecordingMailer {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Reject the next `n` sends.
        pub fn fail_next(&self, n: u32) {
            self.lock().failures_left = n;
        }

        /// Emails delivered so far.
        #[must_use]
        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.lock().sent.clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
            let mut inner = self.lock();
            if inner.failures_left > 0 {
                inner.failures_left -= 1;
                return Err(EmailError::Rejected("relay unavailable".to_string()));
            }
            inner.sent.push(email.clone());
            Ok(())
        }
    }
}
