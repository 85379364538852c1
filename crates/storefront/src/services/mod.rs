//! Business logic services.
//!
//! - [`checkout`] - Turns cart contents into provider session and intent parameters
//! - [`webhook`] - Dispatches verified payment events
//! - [`notifications`] - Renders queued emails
//! - [`outbox`] - Background delivery of queued emails
//! - [`email`] - SMTP transport

pub mod checkout;
pub mod email;
pub mod notifications;
pub mod outbox;
pub mod webhook;

pub use checkout::{CheckoutError, PaymentIntentRequest};
#[cfg(any(test, feature = "test-util"))]
pub use email::RecordingMailer;
pub use email::{EmailError, Mailer, OutgoingEmail, SmtpMailer};
pub use outbox::OutboxWorker;
pub use webhook::WebhookOutcome;
