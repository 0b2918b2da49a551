//! Process entrypoint: parses the CLI, loads and analyzes the spec, compiles
//! the route table, and runs the server until SIGINT/SIGTERM.
//!
//! Grounded in the teacher's `main.rs` (`clap::Parser` args, a
//! `tracing_subscriber` init, `eprintln!` + `std::process::exit(1)` at the
//! outermost boundary for unrecoverable startup failures).

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use steady::analyzers::default_analyzers;
use steady::config::{Args, ConfigFile, ServerConfig};
use steady::diagnostics::{run_analyzers, DiagnosticCollector};
use steady::document::{self, SpecSource};
use steady::logging;
use steady::refgraph::RefGraph;
use steady::registry::SchemaRegistry;
use steady::server::{self, AppState};

#[tokio::main]
async fn main() {
	if let Err(message) = run().await {
		eprintln!("error: {message}");
		std::process::exit(1);
	}
}

async fn run() -> Result<(), String> {
	let args = Args::parse();

	let config_file = match &args.config {
		Some(path) => Some(steady::config::load_config_file(path).map_err(|e| e.to_string())?),
		None => None::<ConfigFile>,
	};
	let config = ServerConfig::merge(&args, config_file.as_ref());

	logging::init(config.log_level);

	let source = SpecSource::from_arg(&args.spec).map_err(|e| e.to_string())?;
	let loaded = document::load(source).map_err(|e| e.to_string())?;

	let raw = Arc::new(loaded.raw);
	let graph = Arc::new(RefGraph::build(&raw));
	let registry = Arc::new(SchemaRegistry::new(raw.clone(), graph.clone()));

	let analyzer_diagnostics = run_analyzers(&default_analyzers(), &registry, &graph);
	let mut static_diagnostics = loaded.startup_diagnostics;
	static_diagnostics.extend(analyzer_diagnostics);
	logging::log_startup_diagnostics(&static_diagnostics);

	let collector = Arc::new(DiagnosticCollector::new(static_diagnostics));

	let state = AppState::build(raw, &loaded.typed, graph, registry, config, collector).map_err(|e| e.to_string())?;

	let shutdown = CancellationToken::new();
	let shutdown_signal = shutdown.clone();
	tokio::spawn(async move {
		wait_for_shutdown_signal().await;
		shutdown_signal.cancel();
	});

	server::run(state, shutdown).await.map_err(|e| e.to_string())
}

async fn wait_for_shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{signal, SignalKind};
		let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {},
			_ = sigterm.recv() => {},
		}
	}
	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
	}
}
