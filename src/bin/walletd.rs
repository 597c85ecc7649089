//! walletd daemon - wallet RPC service over HTTP.
//!
//! Every command is a POST to /<command> with a JSON body:
//!   curl -X POST localhost:9256/generate_mnemonic
//!   curl -X POST localhost:9256/log_in -d '{"fingerprint": 3148227829}'
//!   curl -X POST localhost:9256/get_wallet_balance -d '{"wallet_id": 1}'
//!
//! Configuration:
//!   --port, -p <port>       Listen port (default: 9256, env: WALLETD_PORT)
//!   --data-dir, -d <path>   Data directory (env: WALLETD_ROOT)

use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use walletd::logging::init_logging;
use walletd::rpc::create_router_with_name;
use walletd::runtime::install_signal_handlers;
use walletd::simulator::SimNodeFactory;
use walletd::{LifecycleManager, ServiceConfig, WalletRpc};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = match ParsedArgs::parse(&args[1..]) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}", json!({ "error": e }));
            std::process::exit(1);
        }
    };

    if opts.help {
        print_usage();
        return;
    }
    if opts.version {
        println!("walletd 0.1.0");
        return;
    }

    if let Err(e) = run(opts) {
        eprintln!("{}", json!({ "error": e.to_string() }));
        std::process::exit(1);
    }
}

fn run(opts: ParsedArgs) -> anyhow::Result<()> {
    let mut config = ServiceConfig::new("walletd");
    if let Some(port) = opts.port {
        config = config.with_port(port);
    }
    if let Some(dir) = opts.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(ms) = opts.poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    if let Some(secs) = opts.confirm_deadline_secs {
        config = config.with_confirm_deadline(Duration::from_secs(secs));
    }

    let port = config.port;
    let lifecycle =
        Arc::new(LifecycleManager::new(config, Arc::new(SimNodeFactory::new(1)))?);
    let rpc = Arc::new(WalletRpc::new(lifecycle.clone()));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let shutdown = install_signal_handlers();
        let router = create_router_with_name(rpc, "walletd");
        let addr = format!("0.0.0.0:{}", port);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("walletd listening on http://{}", addr);
        info!("  GET  /health       - Health check");
        info!("  POST /<command>    - Run a wallet command");

        let mut shutdown_rx = shutdown.subscribe();
        tokio::select! {
            result = axum::serve(listener, router) => { result?; }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        // Tear down the active wallet subsystem before exiting so its
        // stores are flushed and closed.
        lifecycle.log_out().await;
        Ok::<(), anyhow::Error>(())
    })
}

#[derive(Default)]
struct ParsedArgs {
    port: Option<u16>,
    data_dir: Option<String>,
    poll_interval_ms: Option<u64>,
    confirm_deadline_secs: Option<u64>,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = ParsedArgs::default();
        let mut i = 0;

        while i < args.len() {
            match args[i].as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--port" | "-p" => {
                    opts.port = Some(take_value(args, &mut i, "--port")?.parse().map_err(|_| "invalid --port".to_string())?);
                }
                "--data-dir" | "-d" => {
                    opts.data_dir = Some(take_value(args, &mut i, "--data-dir")?);
                }
                "--poll-interval-ms" => {
                    opts.poll_interval_ms = Some(take_value(args, &mut i, "--poll-interval-ms")?.parse().map_err(|_| "invalid --poll-interval-ms".to_string())?);
                }
                "--confirm-deadline-secs" => {
                    opts.confirm_deadline_secs = Some(take_value(args, &mut i, "--confirm-deadline-secs")?.parse().map_err(|_| "invalid --confirm-deadline-secs".to_string())?);
                }
                other => return Err(format!("Unknown option: {}", other)),
            }
            i += 1;
        }

        if opts.port.is_none() {
            opts.port = env::var("WALLETD_PORT").ok().and_then(|s| s.parse().ok());
        }
        Ok(opts)
    }
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i).cloned().ok_or_else(|| format!("{} requires a value", flag))
}

fn print_usage() {
    println!(
        r#"walletd - wallet RPC service

USAGE:
    walletd [options]

OPTIONS:
    --port, -p <port>               Listen port (default: 9256, env: WALLETD_PORT)
    --data-dir, -d <path>           Data directory (env: WALLETD_ROOT)
    --poll-interval-ms <ms>         Confirmation poll interval (default: 100)
    --confirm-deadline-secs <secs>  Confirmation wait deadline (default: 30)
    --help, -h                      Show this help
    --version, -V                   Print version

COMMANDS (POST /<command> with a JSON body):
    generate_mnemonic, add_key, log_in, delete_key, delete_all_keys,
    get_public_keys, get_private_key,
    get_wallets, get_wallet_summaries, create_new_wallet,
    get_wallet_balance, get_next_puzzle_hash, get_transactions,
    send_transaction, cc_spend, cc_set_name, cc_get_name, cc_get_colour,
    rl_set_admin_info, rl_set_user_info,
    create_offer_for_ids, get_discrepancies_for_offer, respond_to_offer,
    farm_block, get_sync_status, get_height_info, get_connection_info

EXAMPLES:
    walletd --port 9256
    curl -X POST localhost:9256/generate_mnemonic
    curl -X POST localhost:9256/get_wallet_balance -d '{{"wallet_id": 1}}'
"#
    );
}
