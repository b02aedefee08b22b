//! Nightly sweep: reminders for bookings entering their extension window and
//! removal of bookings past their expiry.
//!
//! Each booking is handled on its own. A failure (store or mail) is logged and
//! counted and the sweep moves on to the next booking.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    models::booking::{Booking, BookingContext},
    repositories::{booking as booking_repo, user as user_repo},
    services::{
        booking_rules::reminder_due,
        notifier::{notify_best_effort, Notification, Notifier},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepActionKind {
    Remind,
    Expire,
}

#[derive(Debug, Clone)]
pub struct SweepAction {
    pub kind: SweepActionKind,
    pub booking: Booking,
    pub slot_name: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    pub planned: usize,
    pub reminders_sent: usize,
    pub expired: usize,
    /// Actions that no longer applied by the time they were attempted.
    pub skipped: usize,
    pub notification_failures: usize,
    pub failed: usize,
}

enum Applied {
    Done { notified: bool },
    Skipped,
}

/// Decides what the sweep should do for each booking today.
pub fn plan_sweep(contexts: &[BookingContext], today: NaiveDate) -> Vec<SweepAction> {
    contexts
        .iter()
        .filter_map(|context| {
            let kind = if context.booking.is_past_expiry(today) {
                SweepActionKind::Expire
            } else if reminder_due(context, today) {
                SweepActionKind::Remind
            } else {
                return None;
            };
            Some(SweepAction {
                kind,
                booking: context.booking.clone(),
                slot_name: context.slot_name.clone(),
            })
        })
        .collect()
}

/// Runs one sweep. With `dry_run` the planned actions are only logged.
pub async fn run_sweep(
    pool: &PgPool,
    notifier: &dyn Notifier,
    today: NaiveDate,
    dry_run: bool,
) -> Result<SweepReport, sqlx::Error> {
    let contexts = booking_repo::list_booking_contexts(pool).await?;
    let actions = plan_sweep(&contexts, today);

    let mut report = SweepReport {
        dry_run,
        planned: actions.len(),
        ..SweepReport::default()
    };

    for action in &actions {
        let booking_id = action.booking.id;
        if dry_run {
            tracing::info!(
                %booking_id,
                kind = ?action.kind,
                slot = %action.slot_name,
                expiry = %action.booking.expiry,
                "Dry run: would apply sweep action"
            );
            continue;
        }

        match apply(pool, notifier, action, today).await {
            Ok(Applied::Done { notified }) => {
                match action.kind {
                    SweepActionKind::Remind => report.reminders_sent += 1,
                    SweepActionKind::Expire => report.expired += 1,
                }
                if !notified {
                    report.notification_failures += 1;
                }
            }
            Ok(Applied::Skipped) => {
                tracing::debug!(%booking_id, kind = ?action.kind, "Sweep action no longer applies");
                report.skipped += 1;
            }
            Err(err) => {
                tracing::error!(%booking_id, kind = ?action.kind, error = ?err, "Sweep action failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(?report, %today, "Maintenance sweep finished");
    Ok(report)
}

async fn apply(
    pool: &PgPool,
    notifier: &dyn Notifier,
    action: &SweepAction,
    today: NaiveDate,
) -> Result<Applied, sqlx::Error> {
    let notification = match action.kind {
        SweepActionKind::Remind => {
            // The flag is claimed before sending so two sweeps never both send.
            let Some(claimed) = booking_repo::claim_reminder(pool, &action.booking).await? else {
                return Ok(Applied::Skipped);
            };
            Notification::booking_reminder(&claimed, &action.slot_name)
        }
        SweepActionKind::Expire => {
            let Some(deleted) =
                booking_repo::delete_booking_if_expired(pool, action.booking.id, today).await?
            else {
                return Ok(Applied::Skipped);
            };
            tracing::info!(booking_id = %deleted.id, expiry = %deleted.expiry, "Expired booking removed");
            Notification::booking_expired(&deleted, &action.slot_name, today)
        }
    };

    let Some(user) = user_repo::find_user_by_id(pool, action.booking.user_id).await? else {
        tracing::warn!(booking_id = %action.booking.id, "Booking owner not found, skipping notification");
        return Ok(Applied::Done { notified: false });
    };
    let notified = notify_best_effort(notifier, &user, notification).await;
    Ok(Applied::Done { notified })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookingId, SlotId, UserId};
    use crate::utils::time::add_days;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 15).unwrap()
    }

    fn context(expiry: NaiveDate, reminder_sent: bool) -> BookingContext {
        BookingContext {
            booking: Booking {
                id: BookingId::new(),
                user_id: UserId::new(),
                slot_id: SlotId::new(),
                created: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                expiry,
                extensions: 0,
                description: "Printer spares".into(),
                reminder_sent,
                secret_hash: None,
            },
            attached: true,
            slot_name: "D3".into(),
            extension_duration_days: 14,
            extension_period_days: 7,
            max_extensions: 2,
        }
    }

    #[test]
    fn plan_expires_only_past_bookings() {
        let yesterday = today().pred_opt().unwrap();
        let contexts = vec![
            context(yesterday, true),
            context(today(), true),
            context(add_days(today(), 30), false),
        ];
        let plan = plan_sweep(&contexts, today());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, SweepActionKind::Expire);
        assert_eq!(plan[0].booking.expiry, yesterday);
    }

    #[test]
    fn plan_reminds_once_inside_window() {
        let contexts = vec![
            context(add_days(today(), 7), false),
            context(add_days(today(), 3), true),
            context(add_days(today(), 8), false),
        ];
        let plan = plan_sweep(&contexts, today());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, SweepActionKind::Remind);
        assert_eq!(plan[0].slot_name, "D3");
    }

    #[test]
    fn expired_booking_is_not_reminded() {
        let yesterday = today().pred_opt().unwrap();
        let plan = plan_sweep(&[context(yesterday, false)], today());
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, SweepActionKind::Expire);
    }
}
