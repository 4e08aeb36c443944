//! TokenGrid daemon: entry point for the mirror worker, the HTTP surface and
//! operator maintenance commands.

mod app;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ethers::types::U256;
use tokio::task::JoinSet;
use tokengrid_chain::{
    input_kinds, parse_token, wallet_from_key, CanonicalOperation, ChainClient, TxParams,
};
use tokengrid_queue::{Message, WorkQueue};
use tokengrid_rpc::{AppState, RpcServer};
use tokengrid_store_lmdb::check_integrity;
use tokengrid_types::{Network, PrivateKey, SystemClock, TokenId};
use tokengrid_utils::{init_logging, LogFormat, ShutdownController};

use crate::app::App;
use crate::config::DaemonConfig;

/// Environment variable holding the hex private key for contract writes.
const SIGNER_KEY_ENV: &str = "TOKENGRID_SIGNER_KEY";

#[derive(Parser)]
#[command(name = "tokengrid-daemon", about = "TokenGrid on-chain mirror daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long, env = "TOKENGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the mirror database and work queue.
    #[arg(long, env = "TOKENGRID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Contract registry file.
    #[arg(long, env = "TOKENGRID_REGISTRY")]
    registry: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TOKENGRID_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TOKENGRID_LOG_LEVEL")]
    log_level: Option<String>,

    /// HTTP port.
    #[arg(long, env = "TOKENGRID_API_PORT")]
    api_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker and the HTTP surface in one process.
    Run,
    /// Queue consumer.
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },
    /// HTTP surface.
    Api {
        #[command(subcommand)]
        action: ApiAction,
    },
    /// Work queue maintenance.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Signed contract writes.
    Contract {
        #[command(subcommand)]
        action: ContractAction,
    },
    /// Mirror database maintenance.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Subcommand)]
enum WorkerAction {
    /// Consume messages until SIGINT/SIGTERM.
    Run,
}

#[derive(Subcommand)]
enum ApiAction {
    /// Serve HTTP until SIGINT/SIGTERM.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum QueueCommand {
    UpdateTokens,
    UpdateToken,
    UploadTokenImage,
    ProcessBlocks,
    ApplyOffchainContent,
}

#[derive(Subcommand)]
enum QueueAction {
    /// Enqueue one message.
    Enqueue {
        #[arg(value_enum)]
        command: QueueCommand,
        network: String,
        /// Required by the per-token commands.
        #[arg(long)]
        token_id: Option<TokenId>,
        #[arg(long, default_value_t = 0)]
        delay_secs: u64,
    },
    /// Move dead-lettered messages back onto the main queue.
    Redrive,
    /// Print approximate visible, in-flight and dead-lettered counts.
    Counts,
}

#[derive(Subcommand)]
enum ContractAction {
    /// Sign and submit a canonical write operation.
    Submit {
        network: String,
        /// Canonical operation, e.g. "writeContentUri".
        operation: String,
        /// Call arguments, parsed against the bound ABI inputs.
        args: Vec<String>,
        #[arg(long)]
        nonce: u64,
        #[arg(long, default_value_t = 300_000)]
        gas_limit: u64,
        /// Gas price in wei (decimal).
        #[arg(long, default_value = "1000000000")]
        gas_price: String,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Verify every database of the mirror environment is present and readable.
    Check,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_toml_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => DaemonConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(registry) = &self.registry {
            config.registry_path = registry.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(port) = self.api_port {
            config.api_port = port;
        }
        Ok(config)
    }
}

fn queue_message(
    command: QueueCommand,
    network: &Network,
    token_id: Option<TokenId>,
) -> anyhow::Result<Message> {
    let token = || token_id.context("--token-id is required for this command");
    Ok(match command {
        QueueCommand::UpdateTokens => Message::update_tokens(network),
        QueueCommand::UpdateToken => Message::update_token(network, token()?),
        QueueCommand::UploadTokenImage => Message::upload_token_image(network, token()?),
        QueueCommand::ProcessBlocks => Message::process_blocks(network),
        QueueCommand::ApplyOffchainContent => Message::apply_offchain_content(network),
    })
}

async fn run_services(app: App, worker: bool, api: bool) -> anyhow::Result<()> {
    let shutdown = ShutdownController::new();
    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

    if worker {
        let worker = app.worker();
        let signal = shutdown.subscribe();
        tasks.spawn(async move {
            worker.run(signal).await;
            Ok(())
        });
    }
    if api {
        let state = AppState::new(&app.ctx, app.offchain(), app.metrics.clone());
        let server = RpcServer::new(app.config.api_port, state);
        let signal = shutdown.subscribe();
        tasks.spawn(async move { server.serve(signal).await.map_err(anyhow::Error::from) });
    }

    let waiter = shutdown.clone();
    tokio::select! {
        _ = waiter.wait_for_signal() => {}
        Some(joined) = tasks.join_next() => {
            // A service stopped on its own; take the others down with it.
            shutdown.shutdown();
            joined.context("service task panicked")??;
        }
    }
    while let Some(joined) = tasks.join_next().await {
        joined.context("service task panicked")??;
    }
    tracing::info!("TokenGrid daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Run => {
            tracing::info!(api_port = config.api_port, data_dir = %config.data_dir.display(), "starting worker and HTTP surface");
            run_services(App::build(config)?, true, true).await?;
        }
        Command::Worker { action: WorkerAction::Run } => {
            tracing::info!(data_dir = %config.data_dir.display(), "starting worker");
            run_services(App::build(config)?, true, false).await?;
        }
        Command::Api { action: ApiAction::Serve } => {
            tracing::info!(api_port = config.api_port, "starting HTTP surface");
            run_services(App::build(config)?, false, true).await?;
        }
        Command::Queue { action } => {
            let queue = app::open_queue(&config, Arc::new(SystemClock))?;
            match action {
                QueueAction::Enqueue {
                    command,
                    network,
                    token_id,
                    delay_secs,
                } => {
                    let network = Network::parse(&network)?;
                    let message = queue_message(command, &network, token_id)?;
                    let id = queue.send(&message, delay_secs).await?;
                    println!("{id}");
                }
                QueueAction::Redrive => {
                    let moved = queue.redrive().await?;
                    println!("redrove {moved} message(s)");
                }
                QueueAction::Counts => {
                    let counts = queue.approximate_counts().await?;
                    println!(
                        "visible: {}\nin-flight: {}\ndead-lettered: {}",
                        counts.visible, counts.in_flight, counts.dead_lettered
                    );
                }
            }
        }
        Command::Contract {
            action:
                ContractAction::Submit {
                    network,
                    operation,
                    args,
                    nonce,
                    gas_limit,
                    gas_price,
                },
        } => {
            let network = Network::parse(&network)?;
            let operation = CanonicalOperation::parse(&operation)
                .with_context(|| format!("unknown canonical operation '{operation}'"))?;
            let registry = app::load_registry(&config)?;
            let contract = registry.resolve(&network)?;
            let function = contract.function(operation)?;
            let kinds = input_kinds(function);
            if kinds.len() != args.len() {
                bail!(
                    "{} takes {} argument(s), got {}",
                    function.name,
                    kinds.len(),
                    args.len()
                );
            }
            let values = kinds
                .iter()
                .zip(&args)
                .map(|(kind, raw)| parse_token(kind, raw))
                .collect::<Result<Vec<_>, _>>()?;

            let key = std::env::var(SIGNER_KEY_ENV)
                .with_context(|| format!("{SIGNER_KEY_ENV} is not set"))?;
            let wallet = wallet_from_key(&PrivateKey::from_hex(&key)?)?;
            let params = TxParams {
                nonce,
                gas_limit,
                gas_price: U256::from_dec_str(&gas_price)
                    .map_err(|e| anyhow::anyhow!("invalid gas price '{gas_price}': {e:?}"))?,
                value: U256::zero(),
            };

            let client = tokengrid_chain::JsonRpcChainClient::new(config.endpoints())?;
            let hash = client
                .submit(&contract, operation, &values, &params, &wallet)
                .await?;
            println!("{hash}");
        }
        Command::Store { action: StoreAction::Check } => {
            let env = app::open_store(&config)?;
            let report = check_integrity(env.env())?;
            println!(
                "checked {} database(s), {} entries",
                report.databases_checked, report.total_entries
            );
            if !report.is_healthy() {
                for error in &report.errors {
                    eprintln!("error: {error}");
                }
                bail!("store check found {} problem(s)", report.errors.len());
            }
        }
    }

    Ok(())
}
