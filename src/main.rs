use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use freeplay::compactor;
use freeplay::config::FacilityConfig;
use freeplay::engine::Engine;
use freeplay::notify::NotifyHub;
use freeplay::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("FREEPLAY_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    freeplay::observability::init(metrics_port);

    let port = std::env::var("FREEPLAY_PORT").unwrap_or_else(|_| "7450".into());
    let bind = std::env::var("FREEPLAY_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("FREEPLAY_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let max_connections: usize = std::env::var("FREEPLAY_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256);
    let compact_threshold: u64 = std::env::var("FREEPLAY_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    // Bad facility configuration is fatal here, before the listener opens.
    let config = FacilityConfig::from_env()?;

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;
    let wal_path = PathBuf::from(&data_dir).join("bookings.wal");

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(config, wal_path, notify)?);
    tokio::spawn(compactor::run_compactor(engine.clone(), compact_threshold));

    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("freeplay listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!(
        "  operating hours: {:02}:00-{:02}:00, {}m slots",
        config.operating_hours.open_hour,
        config.operating_hours.close_hour,
        config.operating_hours.slot_length_minutes
    );
    info!(
        "  weekly cap: {}h, per-booking cap: {}h",
        config.max_booking_hours_per_week, config.max_single_booking_hours
    );
    info!("  max_connections: {max_connections}");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(freeplay::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(freeplay::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(freeplay::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, engine).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(freeplay::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("freeplay stopped");
    Ok(())
}
