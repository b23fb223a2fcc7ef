//! Precedent CLI
//!
//! Command-line interface for the precedent pipeline:
//! - Index metric history into the vector index
//! - Analyse a metric's recent behaviour against similar history
//! - List targets and metric names
//! - Print a default configuration file

use clap::{Parser, Subcommand};
use precedent::{
    generate_default_config, Config, IngestReport, LoggingConfig, Pipeline, PipelineError,
};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "precedent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Metric anomaly analysis backed by historical precedent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index the history of a metric
    Ingest {
        /// PromQL query (default: prometheus.default_query)
        #[arg(short, long)]
        metric: Option<String>,
        /// Range step, e.g. 60s or 5m (default: prometheus.range_step)
        #[arg(short, long)]
        step: Option<String>,
        /// Index synthetic segments instead of querying Prometheus
        #[arg(long)]
        demo: bool,
    },

    /// Analyse the recent behaviour of a metric
    Analyze {
        /// PromQL query (default: prometheus.default_query)
        #[arg(short, long)]
        metric: Option<String>,
        /// Range step (default: prometheus.range_step)
        #[arg(short, long)]
        step: Option<String>,
        /// Analyse synthetic points instead of querying Prometheus
        #[arg(long)]
        demo: bool,
    },

    /// List active targets and metric names
    Targets {
        /// Only list metric names exposed by this instance
        #[arg(short, long)]
        instance: Option<String>,
    },

    /// Print a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)?;
                eprintln!("Config written to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging);

    tracing::info!("precedent v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Pipeline::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let default_metric = config.prometheus.default_query.clone();

    match cli.command {
        Commands::Ingest { metric, step, demo } => {
            let metric = metric.unwrap_or(default_metric);
            let report = run_ingest(&pipeline, &metric, step.as_deref(), demo, &cancel).await?;
            print_json(&report)?;
        }

        Commands::Analyze { metric, step, demo } => {
            let metric = metric.unwrap_or(default_metric);
            let report = if demo {
                pipeline.analyze_demo(&metric).await
            } else {
                pipeline.analyze(&metric, step.as_deref(), &cancel).await?
            };
            print_json(&report)?;
        }

        Commands::Targets { instance } => {
            let report = pipeline.targets(instance.as_deref()).await;
            print_json(&report)?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Synthetic segments are indexed only when asked for; fetch errors propagate
async fn run_ingest(
    pipeline: &Pipeline,
    metric: &str,
    step: Option<&str>,
    demo: bool,
    cancel: &CancellationToken,
) -> Result<IngestReport, PipelineError> {
    if demo {
        pipeline.ingest_demo(metric).await
    } else {
        pipeline.ingest(metric, step, cancel).await
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("precedent={}", logging.level).into());

    // Logs go to stderr; stdout carries the JSON report
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent::{
        Analyst, FetchConfig, FetchError, MemoryIndex, PipelineConfig, PrometheusClient,
        PrometheusConfig,
    };
    use std::sync::Arc;

    async fn offline_pipeline(index: Arc<MemoryIndex>) -> Pipeline {
        // Reserve a port, then close it so nothing is listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = PrometheusClient::new(PrometheusConfig {
            base_url: format!("http://{}", addr),
            range_timeout_secs: 1,
            metadata_timeout_secs: 1,
        })
        .unwrap();
        Pipeline::new(
            Arc::new(backend),
            index,
            Analyst::statistical(),
            FetchConfig::default(),
            // One day fits a single range request
            PipelineConfig {
                ingest_days: 1,
                ..PipelineConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_unreachable_prometheus_is_an_error() {
        let index = Arc::new(MemoryIndex::new(128));
        let pipeline = offline_pipeline(index.clone()).await;

        let err = run_ingest(&pipeline, "node_load1", None, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(FetchError::BackendUnavailable { .. })));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_demo_flag_indexes_synthetic_segments() {
        let index = Arc::new(MemoryIndex::new(128));
        let pipeline = offline_pipeline(index.clone()).await;

        let report = run_ingest(&pipeline, "node_load1", None, true, &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.demo);
        assert_eq!(index.len().await, 24);
    }
}
