//! Daily digest email
//!
//! Renders job listings into an HTML email and delivers it over SMTPS.

use std::fmt;

use common::{JobListing, escape_html};
use lettre::address::AddressError;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport};

pub use lettre::Transport;
use thiserror::Error;
use tracing::{error, info};

pub const DIGEST_SUBJECT: &str = "📰 Your Daily French Job Listings";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("failed to set up SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to send message: {0}")]
    Send(String),
}

/// SMTP account used to send digests.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address, usually the same as `username`.
    pub from: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

/// Parses an address, keeping the input in the error.
pub fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .trim()
        .parse()
        .map_err(|source| NotifyError::Address {
            address: address.to_string(),
            source,
        })
}

/// HTML body of the digest. An empty slice yields an empty list.
pub fn render_digest(jobs: &[JobListing]) -> String {
    let mut html = String::from("<h3>Today's Job Listings:</h3><ul>");
    for job in jobs {
        html.push_str(&format!(
            "<li><strong>{}</strong> at <em>{}</em> – {}<br><a href=\"{}\">View Listing</a></li><br>",
            escape_html(&job.title),
            escape_html(&job.company),
            escape_html(&job.location),
            escape_html(&job.link),
        ));
    }
    html.push_str("</ul>");
    html
}

/// Sends digests through any lettre transport.
pub struct Notifier<T = SmtpTransport> {
    transport: T,
    from: Mailbox,
}

impl Notifier<SmtpTransport> {
    /// SMTP over implicit TLS, authenticated with the configured account.
    pub fn smtp(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&settings.from)?;
        let transport = SmtpTransport::relay(&settings.host)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self::new(transport, from))
    }
}

impl<T> Notifier<T>
where
    T: Transport,
    T::Error: fmt::Display,
{
    pub fn new(transport: T, from: Mailbox) -> Self {
        Self { transport, from }
    }

    pub fn build_message(&self, to: &str, jobs: &[JobListing]) -> Result<Message, NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(DIGEST_SUBJECT)
            .multipart(MultiPart::alternative().singlepart(SinglePart::html(render_digest(jobs))))?;
        Ok(message)
    }

    /// Builds and sends the digest as a single message.
    pub fn try_send(&self, to: &str, jobs: &[JobListing]) -> Result<(), NotifyError> {
        let message = self.build_message(to, jobs)?;
        self.transport
            .send(&message)
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        info!("Sent digest with {} jobs to {}", jobs.len(), to);
        Ok(())
    }

    /// Like [`Notifier::try_send`], but logs the failure and returns `false`.
    pub fn send(&self, to: &str, jobs: &[JobListing]) -> bool {
        match self.try_send(to, jobs) {
            Ok(()) => true,
            Err(e) => {
                error!("Email to {} failed: {}", to, e);
                false
            }
        }
    }
}
