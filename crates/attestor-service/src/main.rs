use anyhow::{Context, Result};
use attestor_config::{Config, ConfigLoader};
use attestor_core::SnapshotStore;
use attestor_retrieval::{cancellation, Cancellation};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod service;

use cli::{Args, Command, StageCommand};
use service::{discard_run, render_config_summary, status_report, AttestorService};

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	setup_tracing(&args.log_level, args.json_logs)?;

	info!("Loading configuration from: {:?}", args.config);
	let config = ConfigLoader::new()
		.with_file(&args.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	match args.command {
		Command::Validate => {
			print!("{}", render_config_summary(&config));
			Ok(())
		}
		Command::Status { json } => {
			let store = SnapshotStore::file(config.storage.path.clone());
			print!("{}", status_report(&store, json).await?);
			Ok(())
		}
		Command::Reset => {
			let store = SnapshotStore::file(config.storage.path.clone());
			discard_run(&store).await?;
			println!("Run discarded");
			Ok(())
		}
		Command::Stage(command) => execute(command, config).await,
	}
}

async fn execute(command: StageCommand, config: Config) -> Result<()> {
	let mut service = AttestorService::open(config).await?;

	match command {
		StageCommand::Prepare(transfer) => {
			service
				.prepare(&transfer.transfer_id, &transfer.credential)
				.await
		}
		StageCommand::Submit => service.submit().await,
		StageCommand::Retrieve => {
			let cancel = cancel_on_interrupt();
			service.retrieve(&cancel).await
		}
		StageCommand::Interact { contract } => {
			if let Some(contract) = contract {
				service.lifecycle_mut().set_contract(contract);
			}
			service.interact().await
		}
		StageCommand::Run { transfer, contract } => {
			if let Some(contract) = contract {
				service.lifecycle_mut().set_contract(contract);
			}
			let cancel = cancel_on_interrupt();
			service
				.run(&transfer.transfer_id, &transfer.credential, &cancel)
				.await
		}
	}
}

/// Cancels the returned signal on Ctrl+C, abandoning any wait in progress.
fn cancel_on_interrupt() -> Cancellation {
	let (handle, cancel) = cancellation();
	tokio::spawn(async move {
		if signal::ctrl_c().await.is_ok() {
			info!("Interrupt received, cancelling");
			handle.cancel();
		}
	});
	cancel
}

fn setup_tracing(log_level: &str, json: bool) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
		.context("Invalid log level")?;

	let registry = tracing_subscriber::registry().with(env_filter);
	let installed = if json {
		registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
			.try_init()
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.try_init()
	};
	installed.context("Failed to install tracing subscriber")?;

	Ok(())
}
