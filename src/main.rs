//! Netstack Cluster - hosts the cluster core for one service instance.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netstack_cluster::config::{PeerConfig, Settings};
use netstack_cluster::{Cluster, Role};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_config_path(&args);

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);

    let cluster = match settings
        .audit
        .open_sink()
        .and_then(|audit| Cluster::from_settings(&settings, audit))
    {
        Ok(cluster) => Arc::new(cluster),
        Err(e) => {
            // No way to authenticate peers: refuse to start
            error!(error = %e, "Cluster misconfigured, refusing to start");
            return ExitCode::FAILURE;
        }
    };

    if args.iter().any(|a| a == "--print-credential") {
        return match cluster.new_cluster_credential() {
            Ok(credential) => {
                println!("{}", credential);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error building credential: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    log_membership(&cluster);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    runtime.block_on(async_main(cluster, settings, config_path));
    ExitCode::SUCCESS
}

/// Async main function.
async fn async_main(cluster: Arc<Cluster>, settings: Settings, config_path: String) {
    let mut static_peers = settings.peers;

    loop {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
            _ = reload_signal() => {
                info!("Reload signal received, reloading configuration...");
                match Settings::load(&config_path) {
                    Ok(new_settings) => {
                        apply_reload(&cluster, &static_peers, &new_settings);
                        static_peers = new_settings.peers;
                        log_membership(&cluster);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to reload configuration, keeping existing settings");
                    }
                }
            }
        }
    }

    info!("Cluster stopped");
}

/// Apply a reloaded configuration: rotate keys, then reconcile static peers.
fn apply_reload(cluster: &Cluster, previous: &[PeerConfig], settings: &Settings) {
    if settings.node.identifier != cluster.self_peer().identifier() {
        warn!(
            configured = %settings.node.identifier,
            running = %cluster.self_peer().identifier(),
            "Node identity cannot change at runtime, restart to apply"
        );
    }

    match cluster.reload_keys(&settings.keys) {
        Ok(()) => info!(keys = cluster.key_count(), "Key rotation applied"),
        Err(e) => error!(error = %e, "Failed to apply key configuration, keeping existing keys"),
    }

    let outcome = cluster.sync_static_peers(previous, &settings.peers);
    info!(
        joined = outcome.joined,
        unchanged = outcome.unchanged,
        left = outcome.left,
        skipped = outcome.skipped,
        "Static peers synchronized"
    );
}

/// Log how many peers serve each role.
fn log_membership(cluster: &Cluster) {
    for role in Role::ALL {
        let peers = cluster.get_peers(role);
        if !peers.is_empty() {
            info!(role = %role, count = peers.len(), "Peers available");
        }
    }
    info!(total = cluster.peer_count(), "Cluster membership");
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for a reload signal (SIGHUP).
#[cfg(unix)]
async fn reload_signal() {
    signal::unix::signal(signal::unix::SignalKind::hangup())
        .expect("Failed to install SIGHUP handler")
        .recv()
        .await;
}

/// No-op reload signal for non-Unix platforms.
#[cfg(not(unix))]
async fn reload_signal() {
    std::future::pending::<()>().await;
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Cluster membership and inter-service authentication for one service instance.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Path to configuration file
                            [default: /etc/netstack/cluster.toml]
        --print-credential  Print the outbound authorization value and exit
    -h, --help              Print help information
    -V, --version           Print version information

SIGNALS:
    SIGHUP                  Reload keys and static peers from the configuration
"#,
        NAME, VERSION, NAME
    );
}

/// Get configuration file path from command line arguments.
fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    "/etc/netstack/cluster.toml".to_string()
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}
