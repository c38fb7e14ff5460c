// src/services/mail.rs

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("invalid SMTP host '{}'", config.host))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        let from = config
            .from
            .parse()
            .with_context(|| format!("SMTP_FROM '{}' is not a valid mailbox", config.from))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse().with_context(|| format!("invalid recipient '{}'", mail.to))?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .context("failed to build e-mail")?;

        self.transport.send(message).await.context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Used when SMTP is not configured: the message only reaches the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        tracing::info!("{}", summary(&mail));
        // Bodies can carry temporary passwords and reset links.
        tracing::debug!(to = %mail.to, "e-mail body:\n{}", mail.body);
        Ok(())
    }
}

fn summary(mail: &OutgoingMail) -> String {
    format!("📧 (not sent) to={} subject={:?}", mail.to, mail.subject)
}

/// Sends in the background; failures are logged and never reach the caller.
pub fn spawn_send(mailer: Arc<dyn Mailer>, mail: OutgoingMail) {
    tokio::spawn(async move {
        let to = mail.to.clone();
        if let Err(e) = mailer.send(mail).await {
            tracing::error!("Failed to send e-mail to {}: {:#}", to, e);
        }
    });
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingMail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(mail);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::RecordingMailer, *};

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _mail: OutgoingMail) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: "someone@example.com".into(),
            subject: "Hello".into(),
            body: "Body".into(),
        }
    }

    #[tokio::test]
    async fn spawned_sends_are_delivered() {
        let mailer = Arc::new(RecordingMailer::default());
        spawn_send(mailer.clone(), mail());

        for _ in 0..50 {
            if !mailer.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(mailer.sent.lock().unwrap().as_slice(), &[mail()]);
    }

    #[test]
    fn log_summary_leaves_the_body_out() {
        let secret = OutgoingMail {
            to: "new.user@example.com".into(),
            subject: "Your account".into(),
            body: "Temporary password: Zx81-kq2P".into(),
        };
        let line = summary(&secret);
        assert!(line.contains("new.user@example.com"));
        assert!(line.contains("Your account"));
        assert!(!line.contains("Zx81-kq2P"));
    }

    #[tokio::test]
    async fn spawned_failures_do_not_panic() {
        spawn_send(Arc::new(FailingMailer), mail());
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn smtp_mailer_rejects_a_bad_sender() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "u".into(),
            password: "p".into(),
            from: "not an address".into(),
        };
        assert!(SmtpMailer::new(&config).is_err());
    }
}
