use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::{error, info, warn};

use storefront_api::{
    auth::{AuthConfig, AuthService},
    config::{init_tracing, load_config},
    db::{ensure_schema, establish_connection_from_app_config},
    events::{process_events, EventSender},
    services::payments::{PaymentGateway, RazorpayClient},
    app_router, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(load_config().context("failed to load configuration")?);
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?,
    );
    if config.auto_migrate {
        ensure_schema(&db).await.context("failed to apply schema")?;
        info!("database schema ensured");
    }

    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(process_events(event_rx));

    let gateway: Option<Arc<dyn PaymentGateway>> =
        match (&config.razorpay_key_id, &config.razorpay_key_secret) {
            (Some(key_id), Some(key_secret)) => Some(Arc::new(RazorpayClient::new(
                key_id.clone(),
                key_secret.clone(),
            ))),
            _ => {
                warn!("payment gateway credentials not configured; checkout endpoints will report a configuration error");
                None
            }
        };

    let auth_service = Arc::new(AuthService::new(AuthConfig::new(
        config.jwt_secret.clone(),
        config.auth_issuer.clone(),
        config.auth_audience.clone(),
        Duration::from_secs(config.jwt_expiration as u64),
    )));

    let state = AppState::new(
        db.clone(),
        config.clone(),
        Some(event_sender),
        gateway,
    );

    spawn_abandoned_order_sweep(state.clone());

    let app = app_router(state, auth_service);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}

/// Background reconciliation: pending orders whose checkout was
/// dismissed and never completed are periodically marked abandoned.
fn spawn_abandoned_order_sweep(state: AppState) {
    if state.config.abandoned_sweep_interval_secs == 0 {
        warn!("abandoned order sweep disabled");
        return;
    }
    let interval = Duration::from_secs(state.config.abandoned_sweep_interval_secs);
    let ttl = ChronoDuration::minutes(state.config.pending_order_ttl_minutes as i64);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = state.orders.sweep_abandoned(ttl).await {
                error!(error = %e, "abandoned order sweep failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
