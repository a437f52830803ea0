use anyhow::Context;
use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use warp::Filter;

use photoblog::config::Config;
use photoblog::geocoding::{CachedGeocoder, NominatimGeocoder};
use photoblog::pipeline::MetadataPipeline;
use photoblog::uploads::UploadDir;
use photoblog::warp_helpers::{cors, handle_rejection};
use photoblog::{build_routes, db, formats};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let address: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    info!("Starting photoblog on {}", address);
    info!("Database: {}", config.db_path);
    info!("Uploads: {}", config.upload_dir);
    info!("Geocoder: {}", config.geocoder.base_url);

    // Check if port is available BEFORE initializing services
    if TcpListener::bind(address).is_err() {
        error!(
            "Port {} is already in use. Stop the other instance or set PHOTOBLOG_PORT.",
            config.port
        );
        anyhow::bail!("Port {} is already in use", config.port);
    }

    formats::register_formats();

    let db_pool = db::create_db_pool(&config.db_path)
        .await
        .context("Failed to open database")?;
    info!("Database initialized successfully");

    let uploads = UploadDir::new(&config.upload_dir).context("Failed to prepare upload dir")?;
    let geocoder = Arc::new(CachedGeocoder::new(NominatimGeocoder::new(&config.geocoder)));
    let pipeline = MetadataPipeline::new(uploads, geocoder, config.jpeg_quality);

    let routes = build_routes(db_pool, pipeline, config.max_upload_bytes())
        .with(cors())
        .with(warp::log("photoblog"))
        .recover(handle_rejection);

    info!("Server started successfully, listening on http://{}", address);

    warp::serve(routes).run(address).await;

    Ok(())
}
