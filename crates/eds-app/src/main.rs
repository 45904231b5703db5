mod admin;
mod connection;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use eds_core::config::{parse_config, PushContext};
use eds_core::{EndpointIndex, LoggingPushScheduler, Metrics, UpdateOrchestrator};
use prometheus_client::registry::Registry;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// Path to the mesh-wide configuration file (YAML).
	#[arg(short, long, value_name = "file")]
	config: PathBuf,

	/// Address the admin/metrics HTTP server binds to.
	#[arg(long, default_value = "0.0.0.0:15014")]
	admin_addr: String,

	/// Reconciliation interval for non-primary registries, in seconds.
	#[arg(long, default_value_t = 30)]
	reconcile_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();

	let args = Args::parse();

	let mesh = parse_config(&args.config).with_context(|| format!("loading mesh config from {}", args.config.display()))?;
	info!(registries = mesh.registries.len(), networks = mesh.networks.networks.len(), "mesh config loaded");

	let mut registry = Registry::default();
	let metrics = Arc::new(Metrics::new(&mut registry));
	let registry = Arc::new(registry);

	let index = Arc::new(EndpointIndex::new());
	let push_context = Arc::new(PushContext::new(Arc::new(mesh)));

	let mut tasks = JoinSet::new();

	tasks.spawn(run_reconciliation_loop(index.clone(), push_context.clone(), metrics.clone(), args.reconcile_interval_secs));

	let metrics_app = admin::MetricsApp::new(registry.clone());
	let debug_app = admin::DebugApp::new(index.clone());
	let router = metrics_app.router().merge(debug_app.router());
	let listener = tokio::net::TcpListener::bind(&args.admin_addr).await.with_context(|| format!("binding admin server to {}", args.admin_addr))?;
	info!(addr = %args.admin_addr, "admin server listening");
	tasks.spawn(async move { axum::serve(listener, router).await.context("admin server exited") });

	while let Some(result) = tasks.join_next().await {
		match result {
			Ok(Ok(())) => {}
			Ok(Err(err)) => warn!(error = %err, "background task failed"),
			Err(err) => warn!(error = %err, "background task panicked"),
		}
	}

	Ok(())
}

/// Drives periodic reconciliation against non-primary registries.
///
/// No concrete [`eds_core::Registry`] implementations (Kubernetes
/// EndpointSlice watcher, Consul client, etc.) are wired in here -- those are
/// external collaborators owned by the control plane's registry-adapter
/// layer. This loop is the seam they plug into; with none configured, it
/// simply ticks and finds nothing to reconcile.
async fn run_reconciliation_loop(index: Arc<EndpointIndex>, push_context: Arc<PushContext>, metrics: Arc<Metrics>, interval_secs: u64) -> Result<()> {
	let scheduler = LoggingPushScheduler;
	let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
	loop {
		ticker.tick().await;
		let orchestrator = UpdateOrchestrator::new(&index, &metrics, &scheduler);
		let aggregator = eds_core::RegistryAggregator::new(&orchestrator, &push_context);
		if let Err(err) = aggregator.reconcile(&[]) {
			warn!(error = %err, "reconciliation pass failed");
		}
	}
}
