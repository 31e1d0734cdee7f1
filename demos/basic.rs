use realtime_pubsub::{Transport, TransportOptions};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // REALTIME_URL, e.g. ws://localhost:8080
    let options = TransportOptions::from_env()?
        .on_open(|| println!("Connected!"))
        .on_message(|envelope| println!("<- {} {}", envelope.message_type, envelope.payload));

    let transport = Transport::new(options)?;

    println!("Connecting...");
    transport.connect()?;
    transport.send("hello", json!({ "from": "basic demo" }))?;

    // Keep connection alive
    tokio::signal::ctrl_c().await?;

    println!("Disconnecting...");
    transport.disconnect().await?;
    println!("Stats: {:?}", transport.stats());

    Ok(())
}
