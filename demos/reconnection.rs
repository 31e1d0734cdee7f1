use realtime_pubsub::{ConnectionStatus, ReconnectStrategy, Transport, TransportOptions};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Watch reconnection against a real server: stop the server while this runs
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let options = TransportOptions::from_env()?
        .with_reconnect_interval(Duration::from_millis(500))
        .with_reconnect_attempts(10)
        .with_reconnect_strategy(ReconnectStrategy::exponential())
        .with_heartbeat_interval(Duration::from_secs(5))
        .with_missed_heartbeat_close(true)
        .on_close(|reason| println!("Closed: {:?}", reason))
        .on_error(|e| println!("Error: {}", e));

    println!("Connecting to: {}\n", options.url);
    let transport = Transport::new(options)?;
    let mut status = transport.watch_status();
    transport.connect()?;

    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        let stats = transport.stats();
        println!(
            "Status: {:<12} attempts={} latency={:?}",
            current.to_string(),
            stats.reconnect_attempts,
            stats.latency
        );

        if current == ConnectionStatus::Error && transport.status() == ConnectionStatus::Error {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if transport.status() == ConnectionStatus::Error {
                println!("\nReconnect policy gave up");
                break;
            }
        }
    }

    transport.disconnect().await?;
    Ok(())
}
