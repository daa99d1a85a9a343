use anyhow::Context;
use arcade::access_point::StaticAccessPoint;
use arcade::gateway::{shutdown_signal, Gateway};
use arcade::storage::DirectoryStorage;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "arcade")]
#[command(about = "LAN Party Arcade gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config, and the (empty) storage root.
    Init {
        /// Config file path (default: ARCADE_CONFIG_PATH or ~/.arcade/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the gateway: wildcard DNS, the game-client file server, and the WebSocket relay.
    Serve {
        /// Config file path (default: ARCADE_CONFIG_PATH or ~/.arcade/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Directory to serve game files from (default from config)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Address handed out in DNS answers (default: ARCADE_AP_ADDRESS or config)
        #[arg(long, value_name = "IPV4")]
        address: Option<std::net::Ipv4Addr>,

        /// HTTP port (default from config or 80)
        #[arg(long)]
        http_port: Option<u16>,

        /// WebSocket relay port (default from config or 81)
        #[arg(long)]
        ws_port: Option<u16>,

        /// DNS port (default from config or 53)
        #[arg(long)]
        dns_port: Option<u16>,
    },
}

struct ServeArgs {
    config: Option<PathBuf>,
    root: Option<PathBuf>,
    address: Option<std::net::Ipv4Addr>,
    http_port: Option<u16>,
    ws_port: Option<u16>,
    dns_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("arcade {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve {
            config,
            root,
            address,
            http_port,
            ws_port,
            dns_port,
        }) => {
            let args = ServeArgs {
                config,
                root,
                address,
                http_port,
                ws_port,
                dns_port,
            };
            if let Err(e) = run_serve(args).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(arcade::config::default_config_path);
    let root = arcade::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", path.display());
    println!("copy the game files (with index.html) into {}", root.display());
    Ok(())
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let (mut config, path) = arcade::config::load_config(args.config)?;
    if let Some(root) = args.root {
        let cwd = std::env::current_dir().context("reading current directory")?;
        arcade::config::override_storage_root(&mut config, root, &cwd);
    }
    if let Some(p) = args.http_port {
        config.gateway.http_port = p;
    }
    if let Some(p) = args.ws_port {
        config.gateway.ws_port = p;
    }
    if let Some(p) = args.dns_port {
        config.gateway.dns_port = p;
    }
    let address = args
        .address
        .unwrap_or_else(|| arcade::config::resolve_ap_address(&config));

    log::info!("=== LAN Party Arcade ===");
    let root = arcade::config::resolve_storage_root(&config, &path);
    let storage = Arc::new(DirectoryStorage::mount(root));
    let access_point = Arc::new(StaticAccessPoint::new(
        config.access_point.ssid.clone(),
        Some(address),
    ));
    log::info!("access point {} at {}", config.access_point.summary(), address);

    let gateway = Gateway::start(&config, access_point, storage).await?;
    gateway.run(shutdown_signal()).await;
    Ok(())
}
