mod api;
mod push_cmd;
mod serve_cmd;
mod terminal_output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use pushcast_config::{config_dir, config_file_path, load_and_prepare, log_warnings, PushcastConfig};
use pushcast_logging::init_logger;

use api::PushApiClient;
use push_cmd::SendArgs;

#[derive(Parser)]
#[command(name = "pushcast")]
#[command(about = "Pushcast: web push subscription registry and fan-out sender")]
#[command(version)]
struct Cli {
    /// Config file (defaults to config.yaml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of a running gateway's push routes
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(long)]
        bind: Option<String>,
    },
    /// Send a notification to every subscription, or to one endpoint
    Send {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Show gateway health and registered subscriptions
    Status,
    /// Print the VAPID public key served to browsers
    PublicKey,
    /// Register a subscription from a JSON file
    Subscribe {
        #[arg(long)]
        file: PathBuf,
    },
    /// Remove a subscription
    Unsubscribe {
        #[arg(long)]
        endpoint: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        terminal_output::note_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let prepared = load_and_prepare(&config_path).await?;
    let mut config = prepared.config;

    if let Commands::Serve { port, bind } = cli.command {
        if let Some(port) = port {
            config.server.port = Some(port);
        }
        if let Some(bind) = bind {
            config.server.bind = Some(bind);
        }
        let _guard = init_logger(config.log_dir().map(Path::new), config.log_level());
        log_warnings(&prepared.warnings);
        return serve_cmd::run(config).await;
    }

    // Operator commands print their own output; keep logs to warnings.
    let _guard = init_logger(None, "warn");
    log_warnings(&prepared.warnings);
    let api = PushApiClient::new(cli.server.clone().unwrap_or_else(|| default_server(&config)));

    match cli.command {
        Commands::Send {
            title,
            body,
            url,
            endpoint,
        } => {
            push_cmd::send(
                &api,
                SendArgs {
                    title,
                    body,
                    url,
                    endpoint,
                },
            )
            .await
        }
        Commands::Status => push_cmd::status(&api, &health_url(&config, cli.server.as_deref())).await,
        Commands::PublicKey => push_cmd::public_key(&api).await,
        Commands::Subscribe { file } => push_cmd::subscribe(&api, &file).await,
        Commands::Unsubscribe { endpoint } => push_cmd::unsubscribe(&api, &endpoint).await,
        Commands::Serve { .. } => Ok(()),
    }
}

/// Local gateway address derived from config.
fn local_origin(config: &PushcastConfig) -> String {
    let host = match config.bind() {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    format!("http://{host}:{}", config.port())
}

fn default_server(config: &PushcastConfig) -> String {
    format!(
        "{}{}",
        local_origin(config),
        config.base_path().trim_end_matches('/')
    )
}

/// `/health` sits at the server root, outside the base path.
fn health_url(config: &PushcastConfig, server: Option<&str>) -> String {
    match server {
        Some(server) => {
            let base = config.base_path().trim_end_matches('/');
            let server = server.trim_end_matches('/');
            let origin = if !base.is_empty() {
                server.strip_suffix(base).unwrap_or(server)
            } else {
                server
            };
            format!("{origin}/health")
        }
        None => format!("{}/health", local_origin(config)),
    }
}
