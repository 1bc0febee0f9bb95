//! ledgerlink CLI — operate the connection manager from the terminal.
//!
//! Usage:
//! ```bash
//! # Probe every configured provider once
//! ledgerlink probe
//!
//! # Connect and show live connection status
//! ledgerlink status
//!
//! # Stream new blocks (optionally watching an address) until Ctrl-C
//! ledgerlink watch --address 0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae
//!
//! # Point reads
//! ledgerlink height
//! ledgerlink tx --hash 0x…
//! ledgerlink block --number 19000000
//! ```
//!
//! Providers come from the `LEDGERLINK_PROVIDERS` environment variable (a
//! JSON array of provider records); without it the built-in public
//! endpoints are used.

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use ledgerlink_manager::{LedgerService, LedgerServiceConfig, RpcConnector};
use ledgerlink_providers::{build_registry, resolve_providers, ProviderRecord};

mod tracing_setup;

#[tokio::main]
async fn main() {
    tracing_setup::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "probe" => cmd_probe().await,
        "status" => cmd_status().await,
        "watch" => cmd_watch(&args[2..]).await,
        "height" => cmd_height().await,
        "tx" => cmd_tx(&args[2..]).await,
        "block" => cmd_block(&args[2..]).await,
        "providers" => {
            cmd_providers();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("ledgerlink {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("ledgerlink {}", env!("CARGO_PKG_VERSION"));
    println!("Multi-provider ledger connection manager\n");
    println!("USAGE:");
    println!("    ledgerlink <COMMAND>\n");
    println!("COMMANDS:");
    println!("    probe      Probe every configured provider once");
    println!("    status     Connect and print connection status");
    println!("    watch      Stream new blocks until Ctrl-C");
    println!("    height     Print the current chain height");
    println!("    tx         Fetch a transaction by hash");
    println!("    block      Fetch a block by number");
    println!("    providers  List built-in provider profiles");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("WATCH FLAGS:");
    println!("    --address <0x…>   Also watch transactions touching an address");
    println!("TX FLAGS:");
    println!("    --hash <0x…>      Transaction hash  [required]");
    println!("BLOCK FLAGS:");
    println!("    --number <N>      Block number  [required]");
}

fn service() -> Result<LedgerService> {
    let records: Vec<ProviderRecord> = match env::var("LEDGERLINK_PROVIDERS") {
        Ok(raw) => serde_json::from_str(&raw).context("parsing LEDGERLINK_PROVIDERS")?,
        Err(_) => vec![],
    };
    let registry = build_registry(resolve_providers(records))?;
    tracing::debug!(providers = registry.len(), "provider registry resolved");
    let service = LedgerService::new(
        registry,
        Arc::new(RpcConnector),
        LedgerServiceConfig::default(),
    )?;
    Ok(service)
}

async fn cmd_probe() -> Result<()> {
    let service = service()?;
    println!("Probing providers...\n");
    let reports = service.perform_health_check().await;
    for report in &reports {
        let verdict = if report.healthy { "OK" } else { "FAIL" };
        let latency = report
            .latency_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".into());
        let detail = report.error.as_deref().unwrap_or("");
        println!("  {:<16} {:<5} {:<8} {}", report.name, verdict, latency, detail);
    }
    let healthy = reports.iter().filter(|r| r.healthy).count();
    println!("\n{healthy}/{} healthy", reports.len());
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let service = service()?;
    if let Err(e) = service.start().await {
        eprintln!("Warning: initial connect failed: {e}");
    }
    let status = service.connection_status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    service.shutdown().await;
    Ok(())
}

async fn cmd_watch(args: &[String]) -> Result<()> {
    let service = service()?;
    service
        .start()
        .await
        .context("establishing initial connection")?;

    let _blocks = service.subscribe_blocks(|block| {
        println!(
            "block {:>10}  {}  ts={}",
            block.height, block.hash, block.timestamp
        );
        Ok(())
    });

    if let Some(address) = parse_flag(args, "--address") {
        service.subscribe_address(&address, |activity| {
            println!(
                "  match {:?} {} tx {} (block {})",
                activity.direction, activity.address, activity.transaction.hash, activity.block.height
            );
            Ok(())
        })?;
        println!("Watching blocks and address {address} — Ctrl-C to stop");
    } else {
        println!("Watching blocks — Ctrl-C to stop");
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    println!("Shutting down...");
    service.shutdown().await;
    Ok(())
}

async fn cmd_height() -> Result<()> {
    let service = service()?;
    service.start().await.context("connecting")?;
    let height = service.current_height().await?;
    println!("{height}");
    service.shutdown().await;
    Ok(())
}

async fn cmd_tx(args: &[String]) -> Result<()> {
    let hash = parse_flag(args, "--hash").ok_or_else(|| anyhow!("--hash is required"))?;
    let service = service()?;
    service.start().await.context("connecting")?;
    let tx = service.transaction(&hash).await?;
    println!("{}", serde_json::to_string_pretty(&tx)?);
    service.shutdown().await;
    Ok(())
}

async fn cmd_block(args: &[String]) -> Result<()> {
    let number = parse_flag(args, "--number")
        .ok_or_else(|| anyhow!("--number is required"))?
        .parse::<u64>()
        .context("--number must be a decimal block number")?;
    let service = service()?;
    service.start().await.context("connecting")?;
    let block = service.block_by_number(number).await?;
    println!("{}", serde_json::to_string_pretty(&block)?);
    service.shutdown().await;
    Ok(())
}

fn cmd_providers() {
    println!("Built-in provider profiles:\n");
    println!("  alchemy     Alchemy (https://alchemy.com)");
    println!("              Networks: Ethereum, Polygon, Arbitrum, Optimism, Base");
    println!("              Auth:     API key");
    println!();
    println!("  infura      Infura (https://infura.io)");
    println!("              Networks: Ethereum, Polygon, Arbitrum, Optimism, Base");
    println!("              Auth:     Project ID");
    println!();
    println!("  public      Free fallback endpoints (no credential needed)");
    println!("              PublicNode, LlamaRPC, dRPC — used automatically");
    println!("              when no usable provider is configured");
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
