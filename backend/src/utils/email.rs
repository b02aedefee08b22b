use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;
use std::env;

use crate::models::user::User;
use crate::services::notifier::{Notification, NotificationTemplate, Notifier};

/// Plain-text mail delivery over SMTP.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    skip_send: bool,
}

impl EmailNotifier {
    pub fn new() -> Result<Self> {
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .unwrap_or(587);
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address = env::var("SMTP_FROM_ADDRESS")
            .unwrap_or_else(|_| "storage@hackspace.local".to_string());
        let skip_send = env::var("SMTP_SKIP_SEND").unwrap_or_default() == "true";

        let mailer = if smtp_username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .build()
        } else {
            let creds = Credentials::new(smtp_username, smtp_password);
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)?
                .port(smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from_address,
            skip_send,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, user: &User, notification: Notification) -> Result<()> {
        if self.skip_send {
            tracing::debug!(
                user_id = %user.id,
                template = notification.template.as_str(),
                "SMTP_SKIP_SEND set, not sending"
            );
            return Ok(());
        }

        let body = render_plain_text(user, &notification);
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(user.email.parse()?)
            .subject(format!("{} - Hackspace Storage", notification.subject))
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

fn field<'a>(context: &'a Value, key: &str) -> &'a str {
    context.get(key).and_then(Value::as_str).unwrap_or("")
}

fn render_plain_text(user: &User, notification: &Notification) -> String {
    let ctx = &notification.context;
    let details = match notification.template {
        NotificationTemplate::BookingCreated => {
            let mut text = format!(
                "Your booking of slot {} is confirmed until {}.\n\nProject: {}\n",
                field(ctx, "slot"),
                field(ctx, "expiry"),
                field(ctx, "description"),
            );
            if let Some(reminder) = ctx.get("reminder_date").and_then(Value::as_str) {
                text.push_str(&format!(
                    "\nYou can extend the booking from {}. We will remind you then.\n",
                    reminder
                ));
            }
            text.push_str(&format!(
                "\nFinished early? Free the slot without logging in:\n{}\n",
                field(ctx, "cancel_url")
            ));
            text
        }
        NotificationTemplate::BookingReminder => format!(
            "Your booking of slot {} expires on {}.\n\nProject: {}\n\nLog in to extend it if you still need the space.\n",
            field(ctx, "slot"),
            field(ctx, "expiry"),
            field(ctx, "description"),
        ),
        NotificationTemplate::BookingExpired => format!(
            "Your booking of slot {} expired on {} and has been removed.\n\nProject: {}\n\nPlease collect anything left in the slot.\n",
            field(ctx, "slot"),
            field(ctx, "expiry"),
            field(ctx, "description"),
        ),
    };

    format!(
        "Hi {},\n\n{}\n---\nHackspace Storage\n",
        user.name, details
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use chrono::Utc;
    use serde_json::json;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            sub: "idp|1".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn created_mail_mentions_cancel_link_and_reminder() {
        let notification = Notification {
            template: NotificationTemplate::BookingCreated,
            subject: "Booking created".into(),
            context: json!({
                "slot": "A1",
                "expiry": "2026-07-01",
                "description": "CNC fixtures",
                "reminder_date": "2026-06-24",
                "cancel_url": "https://storage.example.com/bookings/x/free-email?token=t",
            }),
        };
        let body = render_plain_text(&user(), &notification);
        assert!(body.starts_with("Hi Ada,"));
        assert!(body.contains("slot A1 is confirmed until 2026-07-01"));
        assert!(body.contains("from 2026-06-24"));
        assert!(body.contains("free-email?token=t"));
    }

    #[test]
    fn created_mail_skips_missing_reminder() {
        let notification = Notification {
            template: NotificationTemplate::BookingCreated,
            subject: "Booking created".into(),
            context: json!({ "slot": "A1", "reminder_date": null }),
        };
        let body = render_plain_text(&user(), &notification);
        assert!(!body.contains("remind you"));
    }

    #[test]
    fn expired_mail_names_the_slot() {
        let notification = Notification {
            template: NotificationTemplate::BookingExpired,
            subject: "Booking expired".into(),
            context: json!({ "slot": "B7", "expiry": "2026-05-30", "description": "Kiln shelf" }),
        };
        let body = render_plain_text(&user(), &notification);
        assert!(body.contains("slot B7 expired on 2026-05-30"));
    }
}
