//! Outbound email: SMTP transport with a logging fallback, behind a
//! single in-process job queue. Delivery is best-effort; a failed send is
//! logged and never fails the request that queued it.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// SMTP sender via lettre.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: String,
}

impl SmtpMailer {
    pub fn new(smtp_url: &str, from: String) -> anyhow::Result<Self> {
        let transport = SmtpTransport::from_url(smtp_url)?.build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        Ok(())
    }
}

/// Used when SMTP credentials are missing: logs the message instead of
/// sending, so local signup/OTP flows stay usable.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        warn!("MOCK EMAIL (no SMTP configured) to={} subject={}", to, subject);
        Ok(())
    }
}

#[derive(Debug)]
struct EmailJob {
    to: String,
    subject: String,
    html: String,
}

/// Handle to the email worker. Cloneable; enqueueing never blocks and
/// never errors the caller.
#[derive(Clone)]
pub struct EmailQueue {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl EmailQueue {
    /// Spawn the worker task draining the queue against the given mailer.
    pub fn start(mailer: Arc<dyn Mailer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EmailJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match mailer.send(&job.to, &job.subject, &job.html).await {
                    Ok(()) => info!("email sent to {}", job.to),
                    Err(e) => error!("failed to send email to {}: {}", job.to, e),
                }
            }
        });

        Self { tx }
    }

    pub fn enqueue(&self, to: &str, subject: &str, html: String) {
        let job = EmailJob {
            to: to.to_string(),
            subject: subject.to_string(),
            html,
        };
        if self.tx.send(job).is_err() {
            error!("email queue closed; dropping message to {}", to);
        }
    }
}
