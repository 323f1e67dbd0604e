use std::net::Ipv4Addr;
use std::sync::Arc;

use bindery::{api, config, logging, pipeline};
use tokio::net::TcpListener;

/// Ports tried in order when `SERVER_PORT` is not pinned.
const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 4200..=4299;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let service = Arc::new(pipeline::UploadService::new().await);
    let app = api::create_router(service);

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!(
        upload_root = %config::get_config().upload_root,
        "Listening on http://0.0.0.0:{port}"
    );
    axum::serve(listener, app).await.unwrap();
}

async fn bind_listener() -> std::io::Result<(TcpListener, u16)> {
    if let Some(port) = config::get_config().server_port {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        return Ok((listener, port));
    }

    for port in FALLBACK_PORTS {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        format!(
            "No free port in {}-{}",
            FALLBACK_PORTS.start(),
            FALLBACK_PORTS.end()
        ),
    ))
}
