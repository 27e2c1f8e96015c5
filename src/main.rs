use amphora::controller::{ChargeController, ControllerCommand};
use amphora::hub::MemoryHub;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Controller command channel
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControllerCommand>();

    // Standalone runs use the in-memory hub; platform integrations embed the
    // library and supply their own MeterHub implementation.
    let hub = Arc::new(MemoryHub::new());

    let mut controller = ChargeController::new(hub, cmd_rx)
        .map_err(|e| anyhow::anyhow!("Failed to create controller: {}", e))?;

    info!("Amphora charge controller starting up");

    // Translate Ctrl-C into a clean shutdown
    let shutdown_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(ControllerCommand::Shutdown);
        }
    });

    match controller.run().await {
        Ok(()) => {
            info!("Controller shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Controller failed with error: {}", e);
            Err(anyhow::anyhow!("Controller error: {}", e))
        }
    }
}
