use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mint_meetings::{create_router, AppState, Config, MeetingRecorder, MeetingStore};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mint-meetings", about = "Meeting capture and notes service")]
struct Args {
    /// Config file (without extension), loaded via the config crate
    #[arg(long, default_value = "config/mint-meetings")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Storage root: {}", cfg.storage.root.display());

    let store = Arc::new(MeetingStore::new(cfg.storage.root.clone()));
    let recorder = Arc::new(MeetingRecorder::new(cfg.clone(), Arc::clone(&store)));
    let state = AppState::new(recorder, store);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
