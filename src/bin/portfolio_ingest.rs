//! Service binary: REST API plus the recurring consolidation job.

use anyhow::Context;
use clap::Parser;
use portfolio_ingest::api::rest::{AppState, create_router};
use portfolio_ingest::application::batch::{ConsolidationJob, JobLauncher, JobRunner, JobScheduler};
use portfolio_ingest::application::services::{AggregateConsolidator, ImportService, RetryPolicy};
use portfolio_ingest::infrastructure::config::AppConfig;
use portfolio_ingest::infrastructure::notification::{LogNotifier, OperatorNotifier, SmtpNotifier};
use portfolio_ingest::infrastructure::persistence::in_memory::InMemoryStore;
use portfolio_ingest::infrastructure::persistence::postgres::PgStore;
use portfolio_ingest::infrastructure::persistence::{
    ConsolidationStore, FinancialAssetRepository, InstitutionRepository, OperationRepository,
    PortfolioRepository, TransactionRepository, UserRepository,
};
use portfolio_ingest::infrastructure::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "portfolio-ingest", version, about)]
struct Cli {
    /// Extra configuration file, applied over `config/default.toml`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the consolidation job once and exit instead of serving.
    #[arg(long)]
    run_once: bool,
}

/// Every port the service needs, implemented by one store.
trait Store:
    OperationRepository
    + UserRepository
    + PortfolioRepository
    + InstitutionRepository
    + FinancialAssetRepository
    + TransactionRepository
    + ConsolidationStore
    + 'static
{
}

impl<T> Store for T where
    T: OperationRepository
        + UserRepository
        + PortfolioRepository
        + InstitutionRepository
        + FinancialAssetRepository
        + TransactionRepository
        + ConsolidationStore
        + 'static
{
}

fn notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn OperatorNotifier>> {
    match &config.notifier.smtp {
        Some(settings) => {
            let notifier = SmtpNotifier::new(settings).context("invalid SMTP settings")?;
            tracing::info!(host = %settings.host, "operator alerts by e-mail");
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

fn build_state<S: Store>(store: S, config: &AppConfig) -> anyhow::Result<AppState> {
    let store = Arc::new(store);
    let consolidator = AggregateConsolidator::new(store.clone());
    let import_service = ImportService::new(store.clone(), store.clone(), consolidator)
        .with_timeout(config.import.timeout());

    let job = ConsolidationJob::new(
        &config.batch.job_name,
        config.batch.page_size,
        store.clone(),
        store.clone(),
        store.clone(),
    );
    let launcher = JobLauncher::new(
        Arc::new(JobRunner::new(job, config.batch.restartable)),
        RetryPolicy::new(config.batch.max_attempts, config.batch.backoff()),
        notifier(config)?,
    );

    Ok(AppState {
        import_service,
        launcher: Arc::new(launcher),
        users: store.clone(),
        portfolios: store.clone(),
        transactions: store.clone(),
        assets: store.clone(),
        institutions: store,
    })
}

async fn state(config: &AppConfig) -> anyhow::Result<AppState> {
    match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            store.migrate().await.context("failed to run migrations")?;
            tracing::info!("using PostgreSQL store");
            build_state(store, config)
        }
        None => {
            tracing::warn!("no database configured, using the in-memory store");
            build_state(InMemoryStore::new(), config)
        }
    }
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
    let _ = shutdown.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    telemetry::init_tracing(&config.logging).context("failed to install tracing subscriber")?;

    let state = Arc::new(state(&config).await?);

    if cli.run_once {
        let execution = state.launcher.launch_now().await?;
        tracing::info!(
            read = execution.read_count,
            written = execution.write_count,
            skipped = execution.skip_count,
            "run finished"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = config.batch.schedule_interval().map(|interval| {
        JobScheduler::new(Arc::clone(&state.launcher), interval).spawn(shutdown_rx)
    });

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    if let Some(handle) = scheduler {
        handle.await.context("scheduler task panicked")?;
    }
    Ok(())
}
