use anyhow::Context as _;
use assetvault::persist::portable;
use assetvault::web::{Gateway, GatewayConfig};
use assetvault::{bootstrap_entities, ActionRegistry, AssetStore, FileStorage, UpdateContext, UserRegistry};
use clap::Parser;
use std::sync::{Arc, RwLock};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "assetvault")]
#[command(about = "AssetVault - permissioned asset store with an HTTP gateway", long_about = None)]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 5001)]
    port: u16,

    /// Backend directory, portable paths allowed
    #[arg(long, default_value = "[]/store")]
    data_dir: String,

    /// Identity requests run under
    #[arg(long, default_value = "root")]
    user: String,

    #[arg(long, default_value = "system")]
    group: String,

    /// Maximum accepted request body size in bytes
    #[arg(long, default_value_t = assetvault::web::DEFAULT_MAX_BODY_SIZE)]
    max_body_size: usize,

    /// Skip mounting the built-in actions
    #[arg(long)]
    no_builtin_actions: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    if let Ok(root) = std::env::current_dir() {
        portable::set_project_root(root);
    }

    let mut registry = UserRegistry::new();
    bootstrap_entities(&mut registry);
    let registry = Arc::new(RwLock::new(registry));

    let storage = FileStorage::new(&cli.data_dir).context("opening the store backend")?;
    let store = Arc::new(AssetStore::new(Box::new(storage)));
    store.load().context("loading the store backend")?;

    let context = UpdateContext::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        cli.user.clone(),
        cli.group.clone(),
    );

    if !cli.no_builtin_actions {
        ActionRegistry::standard()
            .create_registered(&context)
            .context("mounting built-in actions")?;
        store.save().context("saving the store backend")?;
    }

    let gateway = Arc::new(
        Gateway::new(store, registry, cli.user, cli.group).with_config(GatewayConfig {
            max_body_size: cli.max_body_size,
            ..GatewayConfig::default()
        }),
    );

    assetvault::web::serve(gateway, &cli.host, cli.port)
        .await
        .context("running the gateway")?;
    Ok(())
}
