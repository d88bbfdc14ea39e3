mod config;

use clap::{Args, Parser};
use config::{CommonConfig, Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "central_router";

#[derive(Parser)]
enum CliCommand {
    /// Runs the multi-tenant webhook router
    WebhookRouter(CliArgs),
}

#[derive(Args)]
struct CliArgs {
    #[arg(long)]
    config_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("missing `webhook_router` section in config")]
    MissingSection,
    #[error("invalid sentry dsn: {0}")]
    Sentry(String),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("webhook router failed: {0}")]
    WebhookRouter(#[from] webhook_router::errors::WebhookRouterError),
}

fn main() {
    let cli = CliCommand::parse();

    let result = match cli {
        CliCommand::WebhookRouter(args) => run_webhook_router(&args),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run_webhook_router(args: &CliArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config_path)?;
    let router_config = config.webhook_router.ok_or(CliError::MissingSection)?;

    let _sentry = init_logging(&config.common)?;
    init_metrics(&config.common)?;

    tracing::info!(config_path = %args.config_path.display(), "Starting webhook router");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(webhook_router::run(router_config))?;

    tracing::info!("Webhook router stopped");
    Ok(())
}

/// Installs the tracing subscriber. The returned guard flushes Sentry on drop.
fn init_logging(common: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let guard = match &common.logging {
        Some(LoggingConfig { sentry_dsn }) => {
            let dsn = sentry_dsn
                .parse::<sentry::types::Dsn>()
                .map_err(|e| CliError::Sentry(e.to_string()))?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    Ok(guard)
}

fn init_metrics(common: &CommonConfig) -> Result<(), CliError> {
    let Some(MetricsConfig {
        statsd_host,
        statsd_port,
    }) = &common.metrics
    else {
        tracing::info!("No metrics backend configured");
        return Ok(());
    };

    let recorder = StatsdBuilder::from(statsd_host.as_str(), *statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(webhook_router::metrics_defs::ALL_METRICS);

    tracing::info!(%statsd_host, statsd_port, "Metrics recorder installed");
    Ok(())
}
