use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wallet_api::{
    ApiConfig, ApiContext, BalanceFormatter, Collaborators, Connection, ConnectionOrchestrator,
    Extension, MemoryKeyring, NoExtension, QueueTxMessageSetStatus, QueueTxPayloadAdd,
    StaticExtension, WsProvider,
};
use wallet_query::{BalanceView, Call, QueryParam};

#[derive(Parser, Debug)]
#[command(name = "wallet-connect", version, about = "Connect to a node and report the wallet's view of it")]
struct Cli {
    /// Node WebSocket endpoint
    #[arg(long, env = "WALLET_ENDPOINT")]
    endpoint: Option<String>,
    /// JSON file with an `ApiConfig`
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address prefix; -1 uses the generic prefix
    #[arg(long, env = "WALLET_SS58_PREFIX", allow_negative_numbers = true)]
    ss58_prefix: Option<i32>,
    /// JSON list of injected accounts (`[{"address", "meta": {"name", "source"}}]`)
    #[arg(long)]
    accounts: Option<PathBuf>,
    /// Seconds to wait for the chain to become ready
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Addresses whose free balance to show
    #[arg(long = "balance", value_name = "ADDRESS")]
    balances: Vec<String>,
    /// Keep printing balance updates until interrupted
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ApiConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ApiConfig::default(),
    };
    if let Some(endpoint) = cli.endpoint.clone() {
        config.endpoint = endpoint;
    }
    if let Some(prefix) = cli.ss58_prefix {
        config.ui.prefix = prefix;
    }

    let extension: Arc<dyn Extension> = match &cli.accounts {
        Some(path) => Arc::new(
            StaticExtension::from_json_file(path)
                .with_context(|| format!("failed to load accounts from {}", path.display()))?,
        ),
        None => Arc::new(NoExtension),
    };
    let display = Arc::new(BalanceFormatter::new());
    let keyring = Arc::new(MemoryKeyring::new());
    let collaborators = Collaborators {
        extension,
        keyring: keyring.clone(),
        display: display.clone(),
        settings: config.ui.clone(),
    };

    let provider = Arc::new(WsProvider::start(config.clone()));
    let connection = ConnectionOrchestrator::connect(
        provider,
        reject_payloads(),
        log_tx_status(),
        collaborators,
        &config.app_name,
    );

    let mut states = connection.orchestrator.subscribe();
    timeout(Duration::from_secs(cli.timeout), states.wait_for(|s| s.published_ready()))
        .await
        .with_context(|| format!("{} not ready after {}s", config.endpoint, cli.timeout))?
        .context("connection closed")?;
    print_context(&connection.orchestrator.context());

    let wait = Duration::from_secs(cli.timeout);
    show_balances(&connection, &display, &keyring, &cli.balances, wait, cli.watch).await
}

/// There is no signing queue on the command line; every payload is declined.
fn reject_payloads() -> QueueTxPayloadAdd {
    Arc::new(|id, payload, responder| {
        warn!(id, call = %payload.call, address = %payload.address, "declining signing request");
        let _ = responder.send(None);
    })
}

fn log_tx_status() -> QueueTxMessageSetStatus {
    Arc::new(|id, status, detail| {
        info!(id, ?status, detail = detail.as_deref().unwrap_or_default(), "transaction status");
    })
}

fn print_context(context: &ApiContext) {
    println!("chain:        {}", context.current_chain);
    println!("connected:    {}", context.is_api_connected);
    println!("ready:        {}", context.is_api_ready);
    println!("development:  {}", context.is_development);
    println!("substrate v2: {}", context.is_substrate_v2);
    if let Some(tx) = &context.default_tx {
        println!("default tx:   {tx}");
    }
    if let Some(tx) = &context.default_tx_sudo {
        println!("sudo tx:      {tx}");
    }
}

/// Known accounts are labelled with their keyring name and chain address.
fn balance_label(keyring: &MemoryKeyring, address: &str) -> String {
    match keyring.find(address) {
        Some(account) => format!("{} {}: ", account.name, account.address),
        None => format!("{address}: "),
    }
}

async fn show_balances(
    connection: &Connection<WsProvider>,
    display: &Arc<BalanceFormatter>,
    keyring: &MemoryKeyring,
    addresses: &[String],
    wait: Duration,
    watch: bool,
) -> Result<()> {
    let mut views: Vec<(BalanceView, Call<u128>)> = Vec::with_capacity(addresses.len());
    for address in addresses {
        let view = BalanceView::new(vec![QueryParam::from(address.as_str())])
            .with_label(balance_label(keyring, address));
        let mut call = view.subscribe(connection.api.as_ref()).await;
        let latest = timeout(wait, call.first()).await.unwrap_or_default();
        println!("{}", view.render(latest).render(display));
        views.push((view, call));
    }

    if !watch || views.is_empty() {
        return Ok(());
    }

    let mut updates = JoinSet::new();
    for (view, mut call) in views {
        let display = display.clone();
        updates.spawn(async move {
            while call.changed().await {
                println!("{}", view.render(call.latest()).render(&display));
            }
        });
    }

    signal::ctrl_c()
        .await
        .context("failed to install signal handler")?;
    info!("shutting down");
    updates.abort_all();
    Ok(())
}
