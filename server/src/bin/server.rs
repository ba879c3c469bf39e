use mockstream_core::{telemetry, DeliveryServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; variables may come from the shell instead.
    let _ = dotenvy::dotenv();
    telemetry::init();

    let config = ServerConfig::load();
    tracing::info!(
        data = %config.data_path.display(),
        latency_ms = config.latency_ms,
        "Loaded configuration"
    );

    let server = DeliveryServer::new(config);
    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
