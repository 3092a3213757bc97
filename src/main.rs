//! Backend Health Probe Widget Binary

use clap::Parser;
use drweb::clipboard::{self, ClipboardSink, StdoutClipboard};
use drweb::console::Console;
use drweb::{Config, DiagnosticRunner, Result, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "drweb", version, about = "Probe backend health endpoints and show a status badge")]
struct Cli {
    /// Backend base URL (overrides BACKEND_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Origin recorded in reports
    #[arg(long)]
    origin: Option<String>,

    /// Per-probe timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Probe all endpoints at once
    #[arg(long)]
    concurrent: bool,

    /// Run once, print the JSON report and exit (0 = OK, 1 = FAIL, 2 = unconfigured)
    #[arg(long)]
    once: bool,

    /// Copy reports to stdout instead of the system clipboard
    #[arg(long)]
    no_clipboard: bool,

    /// Emit logs as JSON
    #[arg(long, env = "DRWEB_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(cli.log_json);

    info!("Starting DrWeb v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(2);
    }

    info!(
        "DrWeb configuration - Backend: {}, Origin: {}, Timeout: {}ms, Concurrent: {}",
        config.base_url().unwrap_or("<unset>"),
        config.origin,
        config.timeout.as_millis(),
        config.concurrent
    );

    let runner = Arc::new(DiagnosticRunner::new(config)?);

    if cli.once {
        let code = run_once(&runner).await?;
        std::process::exit(code);
    }

    let sink: Box<dyn ClipboardSink> = if cli.no_clipboard {
        Box::new(StdoutClipboard)
    } else {
        clipboard::default_sink()
    };

    let console = Console::new(runner, sink);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    console.run(stdin, &mut stdout).await?;

    info!("DrWeb shutdown complete");
    Ok(())
}

/// Environment first, then command-line overrides
fn load_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();

    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }

    if let Some(origin) = &cli.origin {
        config.origin = origin.clone();
    }

    if let Some(ms) = cli.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }

    if cli.concurrent {
        config.concurrent = true;
    }

    config
}

async fn run_once(runner: &DiagnosticRunner) -> Result<i32> {
    match runner.run_all().await {
        RunOutcome::Completed(report) => {
            println!("{}", report.to_pretty_json()?);
            Ok(if report.is_ok() { 0 } else { 1 })
        }
        RunOutcome::NotConfigured => {
            error!("No backend URL configured; set BACKEND_URL or pass --base-url");
            Ok(2)
        }
        RunOutcome::AlreadyRunning => Ok(1),
    }
}

/// Initialize structured logging on stderr
fn initialize_tracing(json: bool) {
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .json()
    });

    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer)
        .with(text_layer)
        .init();
}
