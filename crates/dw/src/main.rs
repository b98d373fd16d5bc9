use clap::{Parser, Subcommand};
use dw_core::config::Config;
use dw_core::store::StoreFactory;
use dw_core::types::{NewTenant, RebuildStats, TenantId};
use dw_core::Delivery;
use dw_db::DbStoreFactory;
use dw_events::bus::EventBus;
use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dw", about = "Delivery event ingestion and projections")]
struct Cli {
    /// TOML config file; falls back to `DW_CONFIG`.
    #[arg(long, env = "DW_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve,
    /// Drop and replay projections from the event log.
    RebuildProjections {
        #[arg(long)]
        tenant: Option<i64>,
    },
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Print the OpenAPI document.
    Openapi,
}

#[derive(Subcommand)]
enum TenantCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::Openapi = cli.command {
        println!("{}", dw_serve::openapi::generate_spec());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let factory = DbStoreFactory::new(&config.db_path)?;

    match cli.command {
        Command::Serve => {
            let addr = SocketAddr::new(config.bind, config.port);
            let state = dw_serve::AppState::new(factory, &config);
            if let Err(err) = dw_serve::serve(state, addr).await {
                error!(error = %err, "server stopped");
                return Err(err.into());
            }
        }
        Command::RebuildProjections { tenant } => {
            let tenant = tenant.map(TenantId::new).transpose()?;
            let delivery = Delivery::new(factory.open()?, EventBus::new(1));
            let stats = delivery.projections().rebuild(tenant)?;
            print_rebuild_summary(tenant, &stats);
        }
        Command::Tenant {
            command: TenantCommand::Add {
                name,
                token,
                secret,
            },
        } => {
            let delivery = Delivery::new(factory.open()?, EventBus::new(1));
            let tenant = delivery.tenants().create(&NewTenant {
                name,
                auth_token: token,
                webhook_secret: secret,
                enabled: true,
            })?;
            println!(
                "{} tenant {} (id {})",
                "created".green().bold(),
                tenant.name.bold(),
                tenant.id
            );
        }
        Command::Openapi => {}
    }
    Ok(())
}

fn print_rebuild_summary(tenant: Option<TenantId>, stats: &RebuildStats) {
    let scope = tenant.map_or_else(|| "all tenants".to_string(), |id| format!("tenant {id}"));
    println!("{} projections for {scope}", "rebuilt".green().bold());
    let rows = [
        ("events replayed", stats.events_replayed),
        ("current state", stats.current_state_rows),
        ("environment state", stats.env_state_rows),
        ("daily stats", stats.daily_stats_rows),
        ("deployments", stats.deployment_rows),
        ("change links", stats.change_link_rows),
        ("chain markers", stats.chain_marker_rows),
    ];
    for (label, count) in rows {
        println!("  {:<18} {}", label.dimmed(), count.cyan());
    }
}
