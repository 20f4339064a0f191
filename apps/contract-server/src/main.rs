use anyhow::{Context, Result};
use api_ingress::{ApiIngress, ApiIngressConfig};
use clap::{Parser, Subcommand};
use contractkit::{register_contract, Contract, RoutingTable, ServiceHub};
use directory::{CompanyApi, PeopleApi};
use mimalloc::MiMalloc;
use runtime::{config::default_logging_config, AppConfig, CliArgs};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const INGRESS_MODULE: &str = "api_ingress";

/// Contract server - HTTP routes generated from service contracts
#[derive(Parser)]
#[command(name = "contract-server")]
#[command(about = "Contract server - HTTP routes generated from service contracts")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration and contract registration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_else(default_logging_config);
    runtime::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("Contract server starting");

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

/// Ingress settings; the `server` section supplies the address unless the
/// module section names its own `bind_addr`.
fn ingress_config(config: &AppConfig) -> Result<ApiIngressConfig> {
    let mut ingress: ApiIngressConfig = config.module_config(INGRESS_MODULE)?;
    let explicit = config
        .modules
        .get(INGRESS_MODULE)
        .and_then(|raw| raw.get("bind_addr"))
        .is_some();
    if !explicit {
        ingress.bind_addr = format!("{}:{}", config.server.host, config.server.port);
    }
    Ok(ingress)
}

fn routing_table<C>(hub: &ServiceHub) -> Result<RoutingTable>
where
    C: Contract + ?Sized,
{
    register_contract::<C>(hub)
        .with_context(|| format!("Error creating dynamic controller for {}", C::NAME))
}

/// Register the directory services, derive their routing tables and mount
/// them on a fresh ingress.
fn assemble(config: &AppConfig) -> Result<ApiIngress> {
    let hub = ServiceHub::new();
    directory::register_services(&hub);

    let ingress = ApiIngress::new(ingress_config(config)?);
    ingress.mount(routing_table::<dyn PeopleApi>(&hub)?)?;
    ingress.mount(routing_table::<dyn CompanyApi>(&hub)?)?;
    Ok(ingress)
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Registering contracts...");
    let ingress = assemble(&config)?;
    let router = ingress.build_router()?;

    let cancel = CancellationToken::new();
    let signals = runtime::cancel_on_shutdown(cancel.clone());

    let served = ingress.serve(router, cancel.clone()).await;
    cancel.cancel();
    let _ = signals.await;

    served.context("HTTP server failed")?;
    tracing::info!("Contract server stopped");
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    let ingress = assemble(&config)?;
    let addr = &ingress.config().bind_addr;
    addr.parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{addr}'"))?;
    ingress.build_router()?;

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Server config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}
