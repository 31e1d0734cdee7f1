use realtime_pubsub::{LifecycleEvent, RealtimeManager, TransportOptions, WebSocketConnector};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Reads lines from stdin and publishes them on a channel
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = TransportOptions::from_env()?;
    let room = std::env::var("REALTIME_ROOM").unwrap_or_else(|_| "lobby".to_string());
    let user = options.user_id.clone().unwrap_or_else(|| "anonymous".to_string());

    let manager = RealtimeManager::new();
    manager.on("status", |event| {
        if let LifecycleEvent::Status(status) = event {
            println!("[status] {}", status);
        }
    });
    manager.initialize_with(options, WebSocketConnector::default())?;

    let channel = manager.channel(&room)?;
    channel.on("typing", |payload| println!("... {} is typing", payload["user"]));
    let mut chats = channel.stream("chat");
    channel.subscribe()?;

    tokio::spawn(async move {
        while let Some(payload) = chats.recv().await {
            println!("[{}] {}", payload["user"], payload["text"]);
        }
    });

    println!("Joined '{}' as {}. Type messages, Ctrl-D to quit.", room, user);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        channel.send("chat", json!({ "user": user, "text": line }))?;
    }

    manager.disconnect().await?;
    Ok(())
}
