//! Outbound mail. Only password reset links are sent today.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use tracing::instrument;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from: Mailbox,
    reply_to: Option<Mailbox>,
    link_lifetime_minutes: u64,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

fn mailbox(value: &str, what: &str) -> Result<Mailbox, Error> {
    value.parse::<Mailbox>().map_err(|e| Error::Internal {
        operation: format!("parse {what} address: {e}"),
    })
}

fn mail_error(e: impl std::fmt::Display) -> Error {
    Error::Upstream {
        service: "mail".to_string(),
        message: e.to_string(),
    }
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        let from = mailbox(&format!("{} <{}>", email_config.from_name, email_config.from_email), "from")?;
        let reply_to = email_config.reply_to.as_deref().map(|r| mailbox(r, "reply-to")).transpose()?;

        Ok(Self {
            transport,
            from,
            reply_to,
            link_lifetime_minutes: (config.auth.password_reset_token_duration.as_secs() / 60).max(1),
        })
    }

    /// Mail `link` to an account owner who asked to reset their password.
    #[instrument(skip(self, link), err)]
    pub async fn send_password_reset_email(&self, to_email: &str, to_name: &str, link: &str) -> Result<(), Error> {
        let body = self.password_reset_body(to_name, link);
        self.send_email(to_email, to_name, "Reset your Rideway password", body).await
    }

    async fn send_email(&self, to_email: &str, to_name: &str, subject: &str, body: String) -> Result<(), Error> {
        let to = if to_name.trim().is_empty() {
            mailbox(to_email, "recipient")?
        } else {
            mailbox(&format!("{to_name} <{to_email}>"), "recipient")?
        };

        let mut builder = Message::builder().from(self.from.clone()).to(to).subject(subject);
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }
        let message = builder.header(ContentType::TEXT_HTML).body(body).map_err(|e| Error::Internal {
            operation: format!("build email message: {e}"),
        })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(mail_error)?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(mail_error)?;
            }
        }

        Ok(())
    }

    fn password_reset_body(&self, to_name: &str, link: &str) -> String {
        let greeting = if to_name.trim().is_empty() {
            "Hello,".to_string()
        } else {
            format!("Hello {to_name},")
        };
        let minutes = self.link_lifetime_minutes;

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Reset your password</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Reset your password</h2>

        <p>{greeting}</p>

        <p>Someone asked to reset the password for your Rideway account. If it wasn't you, ignore this email and nothing will change.</p>

        <p><a href="{link}">Choose a new password</a></p>

        <p>Or paste this link into your browser:</p>
        <p>{link}</p>

        <p>The link works once and expires in {minutes} minutes.</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }
}
