// Entry point for the GCP workbench server

use gcp_workbench::{router, AppState, Config, GcpProject, Metrics};

use anyhow::{Context, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::new().context("Failed to load configuration")?;

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "gcp_workbench={},tower_http=warn",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== GCP WORKBENCH ===");
    info!(
        "Uploads: {}  CSV: {}  Strict CSV load: {}",
        config.upload_dir().display(),
        config.csv_path().display(),
        if config.storage.strict_csv_load { "ON" } else { "OFF" }
    );

    let metrics = Metrics::new();

    // Rehydrate images, catalog and associations
    let (project, _report) = GcpProject::open(&config.storage, metrics)
        .await
        .context("Failed to open project")?;
    let app = router(AppState::new(project), config.max_upload_bytes());

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  POST /upload              - Upload one image (multipart field 'file')");
    info!("  POST /upload_multiple     - Upload images (multipart field 'files')");
    info!("  GET  /images              - List uploaded files");
    info!("  GET  /uploads/:filename   - Fetch an uploaded image");
    info!("  POST /create_gcp          - Create a GCP");
    info!("  GET  /get_all_gcps        - List GCPs");
    info!("  POST /add_gcp             - Link a pixel to a GCP");
    info!("  GET  /get_gcps/:image     - Associations of an image");
    info!("  GET  /download_csv        - Export associations as CSV");
    info!("  GET  /health /metrics /stats");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
