//! Main entry point for the tailor shop workflow service.
//!
//! Loads the configuration, wires the configured storage, backend and
//! notification implementations into an engine, and serves the HTTP API
//! next to the engine's housekeeping loop.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tailor_config::Config;
use tailor_core::{TailorBuilder, TailorEngine, TailorFactories};

mod apis;
mod auth;
mod server;

use tailor_backend::implementations::local::create_backend as create_local_backend;
use tailor_backend::implementations::remote::create_backend as create_remote_backend;
use tailor_notification::implementations::http::create_notifier as create_http_notifier;
use tailor_notification::implementations::log::create_notifier as create_log_notifier;
use tailor_storage::implementations::file::create_storage as create_file_storage;
use tailor_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the tailor service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "TAILOR_CONFIG", default_value = "config/tailor.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started tailor service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!(
		"Loaded configuration [{}] for {}",
		config.service.id,
		config.service.shop_name
	);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			tokio::select! {
				result = engine.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_engine) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running housekeeping only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped tailor service");
	Ok(())
}

/// Builds a name -> factory map, casting each factory to the plain fn type
/// the builder expects.
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};

    // Backends also receive the shared storage service
    ($interface:path, $error:path, storage, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value, Arc<tailor_storage::StorageService>) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the engine with every known implementation registered.
fn build_engine(config: Config) -> Result<TailorEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		tailor_storage::StorageInterface,
		tailor_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let backend_factories = create_factory_map!(
		tailor_backend::BackendInterface,
		tailor_backend::BackendError,
		storage,
		"local" => create_local_backend,
		"remote" => create_remote_backend,
	);

	let notification_factories = create_factory_map!(
		tailor_notification::NotificationInterface,
		tailor_notification::NotificationError,
		"http" => create_http_notifier,
		"log" => create_log_notifier,
	);

	let factories = TailorFactories {
		storage_factories,
		backend_factories,
		notification_factories,
	};

	Ok(TailorBuilder::new(config).build(factories)?)
}
