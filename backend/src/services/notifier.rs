use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    models::{booking::Booking, user::User},
    services::booking::CreatedBooking,
    types::BookingId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    BookingCreated,
    BookingReminder,
    BookingExpired,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::BookingCreated => "booking_created",
            NotificationTemplate::BookingReminder => "booking_reminder",
            NotificationTemplate::BookingExpired => "booking_expired",
        }
    }
}

/// A message for one member: which template, its subject and the values the
/// template is filled with.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub subject: String,
    pub context: Value,
}

impl Notification {
    pub fn booking_created(created: &CreatedBooking, site_url: &str) -> Self {
        let booking = &created.booking;
        Self {
            template: NotificationTemplate::BookingCreated,
            subject: "Booking created".to_string(),
            context: json!({
                "booking_id": booking.id,
                "slot": created.slot_name,
                "description": booking.description,
                "expiry": booking.expiry,
                "reminder_date": created.reminder_date,
                "cancel_url": cancel_url(site_url, booking.id, &created.secret),
            }),
        }
    }

    pub fn booking_reminder(booking: &Booking, slot_name: &str) -> Self {
        Self {
            template: NotificationTemplate::BookingReminder,
            subject: "Booking expiring soon".to_string(),
            context: json!({
                "booking_id": booking.id,
                "slot": slot_name,
                "description": booking.description,
                "expiry": booking.expiry,
            }),
        }
    }

    pub fn booking_expired(booking: &Booking, slot_name: &str, today: NaiveDate) -> Self {
        Self {
            template: NotificationTemplate::BookingExpired,
            subject: "Booking expired".to_string(),
            context: json!({
                "booking_id": booking.id,
                "slot": slot_name,
                "description": booking.description,
                "expiry": booking.expiry,
                "removed_on": today,
            }),
        }
    }
}

/// Link that cancels a booking without logging in.
pub fn cancel_url(site_url: &str, booking_id: BookingId, secret: &str) -> String {
    format!(
        "{}/bookings/{}/free-email?token={}",
        site_url.trim_end_matches('/'),
        booking_id,
        secret
    )
}

/// Outbound delivery of member notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user: &User, notification: Notification) -> anyhow::Result<()>;
}

/// Sends a notification and swallows the failure. Returns whether it was sent.
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    user: &User,
    notification: Notification,
) -> bool {
    let template = notification.template.as_str();
    match notifier.send(user, notification).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(user_id = %user.id, template, error = ?err, "Failed to send notification");
            false
        }
    }
}
