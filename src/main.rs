//! Service binary: loads a SQLite store into a binding environment and
//! serves the synthesis API over HTTP.
//!
//! Configuration comes from an optional `framewright.toml` next to the
//! binary and `FRAMEWRIGHT_*` environment variables, which win:
//! * `store`   – path to the SQLite store (default `framewright.db`)
//! * `listen`  – listen address (default `127.0.0.1:3000`)
//! * `workers` – worker threads for exhaustive requests (default 4)
//! * `demo`    – ignore `store` and serve the built-in demo store

use std::sync::Arc;

use config::Config;
use rusqlite::Connection;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framewright::error::FramewrightError;
use framewright::server::{self, SynthesisService};
use framewright::store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Config::builder()
        .add_source(config::File::with_name("framewright").required(false))
        .add_source(config::Environment::with_prefix("FRAMEWRIGHT"))
        .build()
        .map_err(|e| FramewrightError::Config(e.to_string()))?;
    let store_path = settings
        .get_string("store")
        .unwrap_or_else(|_| "framewright.db".to_owned());
    let listen = settings
        .get_string("listen")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_owned());
    let workers = settings.get_int("workers").unwrap_or(4).max(1) as usize;
    let demo = settings.get_bool("demo").unwrap_or(false);

    let connection = if demo {
        let connection = Connection::open_in_memory()?;
        store::seed_demo(&connection)?;
        info!("demo store seeded in memory");
        connection
    } else {
        info!(store = %store_path, "opening store");
        Connection::open(&store_path)?
    };
    let bindings = store::load_bindings(&connection)?;
    drop(connection);
    if bindings.is_empty() {
        warn!(store = %store_path, "store holds no tables; synthesize requests will find nothing");
    }

    let service = Arc::new(SynthesisService { bindings, workers });
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(%listen, workers, "serving");
    axum::serve(listener, server::router(service)).await?;
    Ok(())
}
