use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use certum::{
    handle_request, initialize_root, shutdown_root, sweep, JsonRpcRequest, RootConfig, RootError,
    RootState, Transport,
};
use certum_core::{Identity, Timestamp};

/// Certum: credential registry and lifecycle engine
///
/// Issuers mint certificates bound to a holder and a content hash;
/// certificates are revoked by their issuer or expire on schedule.
#[derive(Parser, Debug)]
#[command(name = "certum", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a configuration file naming the superadmin
    Init {
        /// Superadmin identity (0x-prefixed, 40 hex digits)
        #[arg(long)]
        superadmin: Identity,

        /// Data directory for Certum state
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Start the JSON-RPC server and the expiration sweep
    Serve {
        /// Transport type: stdio or http
        #[arg(long, default_value = "stdio")]
        transport: String,

        /// Bind address for HTTP transport
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port for HTTP transport
        #[arg(long, default_value = "3000")]
        port: u16,
    },

    /// Read JSON-RPC requests from stdin, then run one sweep batch
    Sweep {
        /// Active entries to scan; defaults to sweep.max_batch from config
        #[arg(long)]
        max_batch: Option<usize>,
    },

    /// Show recent audit log entries
    Audit {
        /// Maximum number of entries to display
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("certum=debug,certum_registry=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("certum=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Init {
            superadmin,
            data_dir,
        } => cmd_init(cli.config.as_ref(), superadmin, data_dir),
        Commands::Serve {
            transport,
            bind,
            port,
        } => cmd_serve(cli.config.as_ref(), &transport, &bind, port).await,
        Commands::Sweep { max_batch } => cmd_sweep(cli.config.as_ref(), max_batch).await,
        Commands::Audit { limit } => cmd_audit(cli.config.as_ref(), limit),
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    superadmin: Identity,
    data_dir: Option<PathBuf>,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;
    config.superadmin = Some(superadmin);
    if let Some(dd) = data_dir {
        config.data_dir = dd;
    }

    info!("initializing certum");

    // Fails early on anything the server would reject.
    let state = initialize_root(config.clone())?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("Certum initialized successfully.");
    println!("  Superadmin: {}", state.registry.superadmin());
    println!("  Data dir:   {}", state.config.data_dir.display());
    println!("  Config:     {}", save_path.display());

    Ok(())
}

/// Answer newline-delimited JSON-RPC on stdin until EOF.
async fn serve_stdio(state: &RootState) {
    use tokio::io::AsyncBufReadExt;

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = reader.lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => {
                let response = handle_request(state, &request);
                let response_json = serde_json::to_string(&response).unwrap_or_else(|_| {
                    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"serialization failed"},"id":null}"#.to_string()
                });
                println!("{}", response_json);
            }
            Err(e) => {
                let error_resp = serde_json::json!({
                    "jsonrpc": "2.0",
                    "error": {
                        "code": certum::rpc_codes::PARSE_ERROR,
                        "message": format!("parse error: {}", e)
                    },
                    "id": null
                });
                println!("{}", error_resp);
            }
        }
    }
}

async fn cmd_serve(
    config_path: Option<&PathBuf>,
    transport: &str,
    bind: &str,
    port: u16,
) -> Result<(), RootError> {
    let mut config = load_config(config_path)?;

    config.server.transport = match transport {
        "http" => Transport::Http {
            bind: bind.to_string(),
            port,
        },
        "stdio" => Transport::Stdio,
        other => {
            return Err(RootError::Config(format!(
                "unknown transport '{}', expected stdio or http",
                other
            )))
        }
    };

    let state = Arc::new(initialize_root(config)?);
    let sweeper = sweep::spawn_sweep_task(state.registry.clone(), &state.config.sweep);

    match &state.config.server.transport {
        Transport::Stdio => {
            info!("starting JSON-RPC server on stdio");
            serve_stdio(&state).await;
        }
        Transport::Http { bind, port } => {
            let addr = format!("{}:{}", bind, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "starting JSON-RPC server on http");

            let app = certum::http::build_router(state.clone());
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    shutdown_root(&state)?;
    Ok(())
}

/// One-shot mode for cron-style hosts.
///
/// The registry lives only as long as the process, so requests that set it
/// up are read from stdin first; the batch then runs against that state.
async fn cmd_sweep(config_path: Option<&PathBuf>, max_batch: Option<usize>) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let max_batch = max_batch.unwrap_or(config.sweep.max_batch);
    if max_batch == 0 || max_batch > certum::config::MAX_SWEEP_BATCH {
        return Err(RootError::Config(format!(
            "--max-batch must be between 1 and {}",
            certum::config::MAX_SWEEP_BATCH
        )));
    }
    let state = initialize_root(config)?;
    serve_stdio(&state).await;

    let report = state.registry.sweep(max_batch)?;
    println!("Sweep: {} committed, {} skipped", report.committed.len(), report.skipped.len());
    for id in &report.committed {
        println!("  expired   {}", id);
    }
    for skipped in &report.skipped {
        println!("  skipped   {} ({})", skipped.certificate_id, skipped.reason);
    }

    shutdown_root(&state)?;
    Ok(())
}

fn cmd_audit(config_path: Option<&PathBuf>, limit: usize) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let path = config.data_dir.join("audit.jsonl");
    if !path.exists() {
        println!("Audit Log (0 entries):");
        println!("  (no entries)");
        return Ok(());
    }

    let contents = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
    println!("Audit Log ({} entries):", lines.len());

    let start = lines.len().saturating_sub(limit);
    for line in &lines[start..] {
        let entry: serde_json::Value = serde_json::from_str(line)?;
        let event = &entry["event"];
        let at = event["timestamp"]["seconds_since_epoch"]
            .as_u64()
            .map(|secs| Timestamp::from_seconds(secs).to_rfc3339())
            .unwrap_or_default();
        println!(
            "  {} {} {}",
            at,
            event["kind"]["event"].as_str().unwrap_or("unknown"),
            entry["hash"].as_str().unwrap_or("")
        );
    }

    Ok(())
}
