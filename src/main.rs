//! Wallgrid control plane entry point
//!
//! One binary, four services. Each subcommand reads its settings from
//! `WALLGRID_*` environment variables, builds its router, and serves it
//! until SIGINT/SIGTERM, closing the database pool and stopping background
//! loops on the way out.

mod cli;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("🛑 Shutdown signal received");
}

async fn serve(listen: &str, router: axum::Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind {listen}"))?;
    info!("🚀 Listening on {}", listen);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn run_mgmt() -> anyhow::Result<()> {
    let settings = wallgrid_mgmt::MgmtSettings::from_env().context("load settings")?;
    info!("🔧 Starting Management Service");

    let pool = wallgrid_mgmt::db::init_pool(&settings)
        .await
        .context("create database pool")?;
    wallgrid_mgmt::db::init_schema(&pool)
        .await
        .context("initialize schema")?;

    let verifier = wallgrid_mgmt::auth::JwtVerifier::new(
        &settings.oidc_public_key_pem,
        &settings.oidc_jwks_path,
        &settings.oidc_issuer,
        &settings.oidc_audience,
    )
    .context("configure JWT verifier")?;

    let http = reqwest::Client::new();
    let state = wallgrid_mgmt::AppState {
        pool: pool.clone(),
        settings: Arc::new(settings.clone()),
        http: http.clone(),
        verifier: Arc::new(verifier),
    };

    let reconciler = tokio::spawn(wallgrid_mgmt::reconcile::reconcile_loop(
        pool.clone(),
        http,
        settings.clone(),
    ));

    let result = serve(&settings.listen, wallgrid_mgmt::routes::router(state)).await;

    reconciler.abort();
    wallgrid_mgmt::db::close_pool(&pool).await;
    result
}

async fn run_config() -> anyhow::Result<()> {
    let settings =
        wallgrid_config::settings::AuthoritySettings::from_env().context("load settings")?;
    info!("🔧 Starting Configuration Authority");

    let event_log = wallgrid_config::events::ReloadEventLog::new(&settings.config_event_log);
    let watcher = Arc::new(wallgrid_config::ConfigWatcher::new(
        &settings.config_path,
        Duration::from_secs(settings.config_poll_interval_s),
        event_log,
    ));

    if std::path::Path::new(&settings.config_path).exists() {
        watcher
            .load_initial()
            .await
            .with_context(|| format!("load {}", settings.config_path))?;
    } else {
        warn!(
            "⚠️ Config file not found: {} (serving no_config until it appears)",
            settings.config_path
        );
    }

    let poll_task = watcher.clone().spawn();
    let state = wallgrid_config::service::AuthorityState {
        watcher: watcher.clone(),
    };

    let result = serve(&settings.listen, wallgrid_config::service::router(state)).await;

    poll_task.abort();
    result
}

async fn run_policy() -> anyhow::Result<()> {
    let settings = wallgrid_policy::settings::PolicySettings::from_env().context("load settings")?;
    info!("🔧 Starting Policy Engine");

    let client = reqwest::Client::new();
    let resolved = wallgrid_policy::loader::resolve_policy(
        &client,
        settings.config_url_opt(),
        settings.policy_path_opt(),
    )
    .await;
    let engine = Arc::new(wallgrid_policy::PolicyEngine::new(
        resolved.doc,
        resolved.source,
    ));

    let state = wallgrid_policy::service::PolicyState {
        engine,
        lookup: Arc::new(wallgrid_policy::MgmtTagLookup::new(settings.mgmt_url.clone())),
        client,
        config_url: settings.config_url_opt().map(str::to_string),
        policy_path: settings.policy_path_opt().map(Into::into),
    };

    serve(&settings.listen, wallgrid_policy::service::router(state)).await
}

async fn run_audit() -> anyhow::Result<()> {
    let settings = wallgrid_audit::settings::AuditSettings::from_env().context("load settings")?;
    info!("🔧 Starting audit service");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_size)
        .connect(&settings.db_dsn)
        .await
        .context("create database pool")?;
    wallgrid_audit::store::init_schema(&pool)
        .await
        .context("initialize audit schema")?;

    let state = wallgrid_audit::service::AuditState {
        pool: pool.clone(),
        chain_id: settings.audit_chain_id.clone(),
    };

    let result = serve(&settings.listen, wallgrid_audit::service::router(state)).await;

    pool.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Mgmt => run_mgmt().await,
        Command::Config => run_config().await,
        Command::Policy => run_policy().await,
        Command::Audit => run_audit().await,
    }
}
