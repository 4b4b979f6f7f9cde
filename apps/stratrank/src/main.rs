use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "stratrank")]
#[command(about = "Backtest trading strategies and rank instruments by win-rate confidence")]
struct Args {
    /// Prometheus metrics listen addr (e.g. 127.0.0.1:9898). Optional.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the `[backtest]` section of a config and print the stored run as JSON.
    Backtest {
        #[arg(long)]
        config: PathBuf,
    },
    /// Rank the `[ranking]` universe under each strategy and print the report as JSON.
    Rank {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the strategy catalogue with parameter definitions.
    Strategies,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Backtest { .. } => "backtest",
            Command::Rank { .. } => "rank",
            Command::Strategies => "strategies",
        }
    }
}

fn main() {
    let args = Args::parse();

    if let Err(err) = init_tracing() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = init_metrics(args.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let command = args.command.name();
    let result = match args.command {
        Command::Backtest { config } => commands::backtest(&config),
        Command::Rank { config } => commands::rank(&config),
        Command::Strategies => commands::strategies(),
    };
    let status = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "stratrank.cli.commands_total",
        "command" => command,
        "status" => status
    )
    .increment(1);
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the JSON document.
fn init_tracing() -> Result<(), String> {
    let filter = std::env::var("STRATRANK_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = metrics_addr else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid --metrics-addr (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    if metrics_addr.is_some() {
        return Err("metrics exporter requires stratrank feature `prometheus`".to_string());
    }
    Ok(None)
}
