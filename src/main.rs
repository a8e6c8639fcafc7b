use std::sync::Arc;

use rust_appserver::config::{AppState, Config};
use rust_appserver::routing::RouteTable;
use rust_appserver::{cloud_code, logger, server, store};

fn main() {
    if let Err(e) = run() {
        eprintln!("[ERROR] {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    // First argument overrides the config file path (extension optional)
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    let store = store::connect(&cfg.app.database_uri)?;
    let registry = Arc::new(cloud_code::registry());
    let mut routes = RouteTable::from_config(&cfg.routes)?;
    cloud_code::register_routes(&mut routes)?;
    let addr = cfg.get_socket_addr()?;

    // Tokio runtime, thread count from server.workers when set
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    let state = Arc::new(AppState::new(cfg, registry, routes, store));

    // LocalSet for spawn_local support
    runtime.block_on(async move {
        let local = tokio::task::LocalSet::new();
        local.run_until(server::serve(addr, state)).await
    })?;

    logger::log_info("Server stopped");
    Ok(())
}
