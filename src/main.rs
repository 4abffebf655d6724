use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::{signal, sync::mpsc};
use tower_http::{compression::CompressionLayer, cors::CorsLayer};
use tracing::{error, info, warn};

use repairshop_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    let app_state = api::AppState::new(db_arc.clone(), cfg.clone(), event_sender);

    // Initial snapshot refresh; never blocks start-up
    match app_state.services.costing.refresh_all_job_costings().await {
        Ok(summary) => info!(
            refreshed = summary.refreshed,
            failed = summary.failed,
            "initial job costing refresh finished"
        ),
        Err(e) => warn!(error = %e, "initial job costing refresh failed"),
    }

    if cfg.scheduler_enabled {
        api::services::scheduler::spawn_job_costing_refresh(
            (*app_state.services.costing).clone(),
            cfg.job_costing_refresh_hour,
        );
    } else {
        info!("job costing scheduler disabled");
    }

    let mut app = Router::new()
        .route("/", get(|| async { "repairshop-api up" }))
        .merge(api::build_router(app_state))
        .layer(CompressionLayer::new());
    if cfg.is_development() {
        info!("Using permissive CORS in development");
        app = app.layer(CorsLayer::permissive());
    }

    let ip = cfg
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid host '{}'", cfg.host))?;
    let addr = SocketAddr::new(ip, cfg.port);
    info!("repairshop-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
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
