use clap::Parser;
use boltgraph::{config, server};

/// boltgraph - a Bolt protocol server over an embedded graph
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bind host for the Bolt listener
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port for the Bolt listener
    #[arg(long, default_value_t = 7687)]
    port: u16,

    /// Optional graph file to load at startup; absent means use the bundled sample graph
    #[arg(long)]
    graph: Option<String>,

    /// Maximum PackStream message size in bytes
    #[arg(long, default_value_t = 65536)]
    max_message_size: usize,

    /// Idle read timeout in seconds before a connection is marked defunct
    #[arg(long, default_value_t = 300)]
    idle_timeout_secs: u64,

    /// Run with graceful shutdown on SIGINT/SIGTERM (background-process friendly)
    #[arg(long)]
    daemon: bool,
}

impl From<Cli> for config::CliConfig {
    fn from(cli: Cli) -> Self {
        config::CliConfig {
            host: cli.host,
            port: cli.port,
            graph: cli.graph,
            max_message_size: cli.max_message_size,
            idle_timeout_secs: cli.idle_timeout_secs,
            daemon: cli.daemon,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!("boltgraph v{}", env!("CARGO_PKG_VERSION"));

    let cli_config: config::CliConfig = cli.into();
    let config = match config::ServerConfig::from_cli(cli_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run_with_config(config).await {
        log::error!("Server error: {:?}", e);
        std::process::exit(1);
    }
}
