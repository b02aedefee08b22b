use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hackspace_storage_backend::{
    app,
    config::Config,
    db::connection::{create_pool, run_migrations},
    state::AppState,
    utils::email::EmailNotifier,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hackspace_storage_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        login_token_secret = %mask_secret(&config.login_token_secret),
        session_idle_timeout_seconds = config.session_idle_timeout_seconds,
        session_absolute_timeout_seconds = ?config.session_absolute_timeout_seconds,
        cookie_name = %config.cookie_name,
        cookie_secure = config.cookie_secure,
        time_zone = %config.time_zone,
        "Loaded configuration from environment/.env"
    );
    if config.login_token_secret == "dev" {
        tracing::warn!("LOGIN_TOKEN_SECRET is using the development fallback");
    }

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    let notifier = Arc::new(EmailNotifier::new()?);
    let bind_addr = config.bind_addr;
    let app = app(AppState::new(pool, config, notifier));

    tracing::info!("Server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
