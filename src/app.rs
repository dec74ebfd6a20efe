use crate::annotate::Annotator;
use crate::config::Settings;
use crate::detector::{Detector, OrtDetector};
use crate::log_store::DetectionLog;
use crate::pipeline::DetectionPipeline;
use crate::server::HttpServer;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Settings) -> Result<(), Box<dyn Error>> {
    config.storage.bootstrap()?;

    // The model must load at startup; a broken model is unrecoverable.
    let detector: Arc<dyn Detector> = match OrtDetector::new(&config.model) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            tracing::error!("Failed to initialize detector: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let annotator = Annotator::new()?;

    let log = DetectionLog::new(config.storage.log_file());
    log.init()?;

    let pipeline = Arc::new(DetectionPipeline::new(
        detector,
        annotator,
        config.storage.clone(),
        log.clone(),
    ));

    let server = HttpServer::new(pipeline, log, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
