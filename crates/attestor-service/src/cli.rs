//! Command-line interface definitions.

use alloy_primitives::Address;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fdc-attest")]
#[command(about = "Attest upstream transfers and record them on-chain", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "ATTESTOR_CONFIG", default_value = "config/coston2.toml")]
	pub config: PathBuf,

	/// Log level or filter directive (trace, debug, info, warn, error)
	#[arg(short, long, env = "ATTESTOR_LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// Emit logs as JSON lines
	#[arg(long)]
	pub json_logs: bool,

	#[command(subcommand)]
	pub command: Command,
}

/// Upstream transfer to attest.
#[derive(ClapArgs, Debug)]
pub struct TransferArgs {
	/// Upstream transfer identifier
	#[arg(long)]
	pub transfer_id: String,

	/// Upstream API token, sent as a bearer credential
	#[arg(long, env = "WISE_API_KEY", hide_env_values = true)]
	pub credential: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	#[command(flatten)]
	Stage(StageCommand),

	/// Show the state and artifacts of the current run
	Status {
		/// Print the raw snapshot as JSON
		#[arg(long)]
		json: bool,
	},

	/// Discard the current run
	Reset,

	/// Validate the configuration file
	Validate,
}

/// Commands that drive the lifecycle and so need the ledger and signing key.
#[derive(Subcommand, Debug)]
pub enum StageCommand {
	/// Build the attestation request and have the verifier encode it
	Prepare(TransferArgs),

	/// Pay the fee and submit the encoded request on-chain
	Submit,

	/// Wait for round finalization and fetch the proof
	Retrieve,

	/// Apply the proof to the transfer list contract
	Interact {
		/// Transfer list contract, overriding `consumer.contract_address`
		#[arg(long)]
		contract: Option<Address>,
	},

	/// Run every remaining stage through to completion
	Run {
		#[command(flatten)]
		transfer: TransferArgs,

		/// Transfer list contract, overriding `consumer.contract_address`
		#[arg(long)]
		contract: Option<Address>,
	},
}
