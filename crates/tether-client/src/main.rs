//! tether: connect a local device and keep the encrypted channel open.

use tether_client::{ClientConfig, ErrorKind};
use tether_store::SqlContainer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = ClientConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("tether={}", config.logging.level).parse()?),
        )
        .init();

    info!("tether starting");
    let handshake = config.handshake_config()?;

    // 2. Open the store; migrations run here and abort startup on failure
    let store_path = config.store_path();
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let container = SqlContainer::open(&store_path)?;

    // 3. Load the device, or start a new one
    let mut device = match container.get_first_device()? {
        Some(device) => device,
        None => {
            info!("no stored device, registering a new one");
            container.new_device()
        }
    };

    // 4. Connect and handshake
    info!(address = %config.connection.address, "connecting");
    let mut socket =
        match tether_client::connect(&config.connection.address, &mut device, &handshake).await {
            Ok(socket) => socket,
            Err(e) => {
                match e.kind() {
                    ErrorKind::Handshake => error!("server failed authentication: {}", e),
                    _ => error!("connection failed: {}", e),
                }
                return Err(e.into());
            }
        };

    // 5. Log incoming frames until Ctrl-C
    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Ok(frame) => info!(len = frame.len(), "received frame"),
                Err(e) => {
                    warn!("connection ended: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    if let Err(e) = socket.close().await {
        warn!("close failed: {}", e);
    }
    info!("tether stopped");
    Ok(())
}
