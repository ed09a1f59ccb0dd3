//! Binary entry point: configuration, runtime assembly, and the `axum` serve loop with graceful
//! shutdown (spec §4.8, §6).

use catalog_cache::{AppState, Result, build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

	let config = catalog_cache::config::Config::from_env()?;
	let state = AppState::new(config)?;

	state.ratings.clone().spawn_scheduler(state.config.ratings_refresh_interval);

	if let Err(err) = state.ratings.run_ingest_once().await {
		tracing::warn!(error = %err, "initial ratings ingest failed, starting with an empty snapshot");
	}

	#[cfg(feature = "prometheus")]
	catalog_cache::install_default_exporter()?;

	let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;

	tracing::info!(addr = %listener.local_addr()?, "catalog-cache-server listening");

	let runtime = state.runtime.clone();
	let router = build_router(state);

	let mut shutdown_signal = runtime.shutdown_signal();
	let server = axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
		.with_graceful_shutdown(async move {
			let _ = shutdown_signal.changed().await;
		});

	let serve_task = tokio::spawn(server);

	tokio::signal::ctrl_c().await?;
	tracing::info!("ctrl-c received, beginning graceful shutdown");

	runtime
		.shutdown(async {
			let _ = serve_task.await;
		})
		.await;

	Ok(())
}
