use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hackspace_storage_backend::{
    config::Config,
    db::connection::{create_pool, run_migrations},
    services::{maintenance::run_sweep, session::SessionManager},
    utils::{
        email::EmailNotifier,
        time::{now_utc, today_local},
    },
};

/// Expires stale bookings, sends extension reminders and purges dead sessions.
#[derive(Debug, Parser)]
#[command(name = "nightly", version)]
struct Args {
    /// Report what would happen without changing anything or sending mail.
    #[arg(long)]
    dry_run: bool,

    /// Keep running and sweep every N seconds instead of once.
    #[arg(long, value_name = "SECONDS")]
    interval_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hackspace_storage_backend=info,nightly=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load()?;
    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    let notifier = EmailNotifier::new()?;
    let sessions = SessionManager::new(pool.clone(), config.clone());

    let Some(interval) = args.interval_seconds.filter(|secs| *secs > 0) else {
        return sweep_once(&pool, &notifier, &sessions, &config, args.dry_run).await;
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&pool, &notifier, &sessions, &config, args.dry_run).await {
            tracing::error!(error = ?err, "Nightly sweep failed");
        }
    }
}

async fn sweep_once(
    pool: &sqlx::PgPool,
    notifier: &EmailNotifier,
    sessions: &SessionManager,
    config: &Config,
    dry_run: bool,
) -> anyhow::Result<()> {
    let today = today_local(&config.time_zone);
    let report = run_sweep(pool, notifier, today, dry_run).await?;
    tracing::info!(
        planned = report.planned,
        reminders_sent = report.reminders_sent,
        expired = report.expired,
        skipped = report.skipped,
        notification_failures = report.notification_failures,
        failed = report.failed,
        dry_run,
        "Booking sweep complete"
    );

    if dry_run {
        return Ok(());
    }
    let purged = sessions.purge_expired(now_utc()).await?;
    if purged > 0 {
        tracing::info!("Deleted {} expired sessions", purged);
    }
    Ok(())
}
