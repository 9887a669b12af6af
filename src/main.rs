mod config;
mod data;
mod error;
mod events;
mod flows;
mod mirror;
mod session;
mod submitter;
#[cfg(test)]
mod testing;
mod utils;
mod wallet;
mod watcher;

use std::fmt::Display;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config, Step};
use crate::data::chains::resolve_network;
use crate::data::export::CsvExport;
use crate::data::types::{ActionStatus, ChainConfig};
use crate::events::FlowEvent;
use crate::flows::donation::DonationFlow;
use crate::flows::voting::VotingFlow;
use crate::flows::{Flow, FlowAction, FlowContract};
use crate::utils::{format_timestamp, truncate_address};
use crate::wallet::local::LocalWallet;
use crate::wallet::WalletProvider;
use crate::watcher::SessionChangeWatcher;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let rpc_url = config.resolve_rpc_url()?;

    // Contract addresses are checked before any network traffic.
    let contract = match &config.command {
        Command::Donation { .. } => config.charity_address()?,
        Command::Voting { .. } => config.voting_address()?,
    };

    info!(%rpc_url, "connecting");
    let wallet = Arc::new(
        LocalWallet::from_keys(&rpc_url, &config.private_keys, config.poll_interval()).await?,
    );
    let chain_id = wallet.chain_id();
    let network = resolve_network(config.chain_config(), chain_id);
    if network.is_none() && config.rpc_url.is_some() {
        debug!(?chain_id, "no preset matches the connected chain");
    }
    let output = Output {
        json: config.json,
        chain_id,
        network,
    };
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let provider: Arc<dyn WalletProvider> = wallet.clone();

    match config.command {
        Command::Donation { command } => {
            let flow = Arc::new(Flow::new(DonationFlow, contract, Some(provider), event_tx));
            run_flow(flow, wallet, event_rx, command.into_step(), &output).await
        }
        Command::Voting { command } => {
            let flow = Arc::new(Flow::new(VotingFlow, contract, Some(provider), event_tx));
            run_flow(flow, wallet, event_rx, command.into_step(), &output).await
        }
    }
}

struct Output {
    json: bool,
    /// As reported by the node, which may differ from `--chain`.
    chain_id: Option<u64>,
    network: Option<ChainConfig>,
}

async fn run_flow<F>(
    flow: Arc<Flow<F>>,
    wallet: Arc<LocalWallet>,
    events: mpsc::UnboundedReceiver<FlowEvent>,
    step: Step<F::Action>,
    output: &Output,
) -> Result<()>
where
    F: FlowContract,
    F::Snapshot: Display + Serialize + CsvExport,
{
    if let Step::Watch = step {
        return watch(flow, wallet, events, output).await;
    }

    // One-shot commands only report action progress.
    let progress = (!output.json).then(|| tokio::spawn(report_progress(events)));

    let session = flow.connect().await?;
    debug!(flow = flow.name(), account = %session.address, "connected");

    match step {
        Step::Status => print_state(&flow, output).await?,
        Step::Act(action) => {
            let kind = action.kind();
            let confirmation = flow.submit(action).await?;
            if output.json {
                let report = serde_json::json!({
                    "action": kind,
                    "tx_hash": confirmation.tx_hash,
                    "block_number": confirmation.block_number,
                    "gas_used": confirmation.gas_used,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{kind} confirmed: {}", confirmation.tx_hash);
                if let Some(url) = output
                    .network
                    .as_ref()
                    .and_then(|c| c.tx_url(&confirmation.tx_hash))
                {
                    println!("{url}");
                }
            }
            print_state(&flow, output).await?;
        }
        Step::Export(path) => {
            let snapshot = flow
                .snapshot()
                .await
                .ok_or_else(|| eyre!("{} state could not be loaded", flow.name()))?;
            let message = snapshot.write_csv(&path).map_err(|e| eyre!(e))?;
            println!("{message}");
        }
        Step::Watch => {}
    }

    if let Some(progress) = progress {
        progress.abort();
    }
    Ok(())
}

async fn print_state<F>(flow: &Flow<F>, output: &Output) -> Result<()>
where
    F: FlowContract,
    F::Snapshot: Display + Serialize,
{
    let session = flow.session().await;
    let snapshot = flow.snapshot().await;

    if output.json {
        let report = serde_json::json!({
            "flow": flow.name(),
            "chain_id": output.chain_id,
            "contract": flow.contract_address(),
            "session": session,
            "snapshot": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match (&output.network, output.chain_id) {
        (Some(network), _) => println!(
            "Network:  {} ({}, {})",
            network.name, network.chain_id, network.symbol
        ),
        (None, Some(chain_id)) => println!("Network:  chain {chain_id}"),
        (None, None) => {}
    }
    println!("Contract: {}", flow.contract_address());
    match session {
        Some(s) if s.is_privileged => {
            println!("Account:  {} ({})", s.address, flow.privileged_role())
        }
        Some(s) => println!("Account:  {}", s.address),
        None => println!("Account:  not connected"),
    }
    match snapshot {
        Some(snapshot) => println!("{snapshot}"),
        None => println!("State unavailable, see warnings above"),
    }
    Ok(())
}

async fn report_progress(mut events: mpsc::UnboundedReceiver<FlowEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            FlowEvent::ActionStatusChanged { kind, status, .. }
                if status != ActionStatus::Idle =>
            {
                eprintln!("{kind}: {status}");
            }
            FlowEvent::ActionSubmitted { tx_hash, .. } => eprintln!("submitted {tx_hash}"),
            FlowEvent::RefreshFailed { reason, .. } => {
                eprintln!("warning: state may be stale: {reason}")
            }
            _ => {}
        }
    }
}

/// Follow wallet notifications and flow events until ctrl-c.
///
/// Lines on stdin drive the local wallet: `accounts`, `use <index>`, `lock`,
/// and `refresh`.
async fn watch<F>(
    flow: Arc<Flow<F>>,
    wallet: Arc<LocalWallet>,
    mut events: mpsc::UnboundedReceiver<FlowEvent>,
    output: &Output,
) -> Result<()>
where
    F: FlowContract,
    F::Snapshot: Display + Serialize,
{
    let _watcher = SessionChangeWatcher::spawn(Arc::clone(&flow))?;
    flow.connect().await?;
    print_state(&flow, output).await?;
    eprintln!("Watching {}. Commands: accounts, use <n>, lock, refresh. Ctrl-C to exit.", flow.name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let refreshed = matches!(event, FlowEvent::SnapshotRefreshed { .. });
                print_event(&event, output.json);
                if refreshed {
                    print_state(&flow, output).await?;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_command(&flow, &wallet, line.trim()).await,
                Ok(None) => stdin_open = false,
                Err(e) => {
                    eprintln!("stdin: {e}");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn handle_command<F: FlowContract>(flow: &Flow<F>, wallet: &LocalWallet, line: &str) {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => {}
        (Some("accounts"), None) => {
            let selected = wallet.selected();
            for (i, account) in wallet.accounts().iter().enumerate() {
                let marker = if Some(*account) == selected { "*" } else { " " };
                println!("{marker} {i}: {account}");
            }
        }
        (Some("use"), Some(index)) => match index.parse::<usize>() {
            Ok(index) => {
                if let Err(e) = wallet.select(index) {
                    eprintln!("{e}");
                }
            }
            Err(_) => eprintln!("usage: use <index>"),
        },
        (Some("lock"), None) => wallet.lock(),
        (Some("refresh"), None) => {
            if let Err(e) = flow.refresh().await {
                eprintln!("refresh failed: {e}");
            }
        }
        _ => eprintln!("unknown command {line:?}"),
    }
}

fn print_event(event: &FlowEvent, json: bool) {
    let text = describe_event(event);
    if json {
        let line = serde_json::json!({
            "time": chrono::Utc::now().to_rfc3339(),
            "flow": event.flow(),
            "event": text,
        });
        println!("{line}");
    } else {
        let now = format_timestamp(chrono::Utc::now().timestamp().max(0) as u64);
        println!("[{now}] {text}");
    }
}

fn describe_event(event: &FlowEvent) -> String {
    match event {
        FlowEvent::SessionChanged {
            session: Some(s), ..
        } => format!(
            "account {}{}",
            truncate_address(&s.address),
            if s.is_privileged { " (privileged)" } else { "" }
        ),
        FlowEvent::SessionChanged { session: None, .. } => "disconnected".to_string(),
        FlowEvent::SnapshotRefreshed { epoch, .. } => format!("state refreshed (session {epoch})"),
        FlowEvent::RefreshFailed { reason, .. } => format!("refresh failed: {reason}"),
        FlowEvent::ActionStatusChanged { kind, status, .. } => format!("{kind}: {status}"),
        FlowEvent::ActionSubmitted { kind, tx_hash, .. } => format!("{kind} submitted {tx_hash}"),
        FlowEvent::ActionConfirmed { kind, tx_hash, .. } => format!("{kind} confirmed {tx_hash}"),
        FlowEvent::ActionFailed { kind, reason, .. } => format!("{kind} failed: {reason}"),
        FlowEvent::Error(message) => format!("error: {message}"),
    }
}
