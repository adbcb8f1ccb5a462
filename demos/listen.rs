//! Connects to a live channel and logs everything it receives.
//!
//! The origin defaults to `http://localhost:8080`, which also enables
//! reload-on-disconnect. Pass another origin and subpath to try a remote server:
//! ```sh
//! RUST_LOG=info cargo run --example listen -- https://example.com /live
//! ```

use live_channel::ws::config::{Config, Endpoint};
use live_channel::ws::{Connection, ConnectionManager, Handler, Message};
use tracing::info;

/// Greets the server on every connection and echoes text messages back.
struct Greeter {
    received: usize,
}

impl Handler for Greeter {
    fn on_connect(&mut self, connection: &Connection) {
        info!(attempt = connection.attempt(), endpoint = %connection.endpoint(), "connected");
        if let Err(e) = connection.send_json(&serde_json::json!({ "type": "hello" })) {
            info!(error = %e, "unable to greet server");
        }
    }

    fn on_message(&mut self, message: Message, connection: &Connection) {
        self.received += 1;
        match message.as_text() {
            Some(text) => {
                info!(received = self.received, %text);
                _ = connection.send(format!("ack {}", self.received));
            }
            None => info!(received = self.received, bytes = message.len(), "binary"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let origin = args.next().unwrap_or_else(|| "http://localhost:8080".to_owned());
    let subpath = args.next();

    let mut config = Config::for_origin(&origin)?;
    if let Some(subpath) = subpath {
        config.endpoint = Endpoint::from_origin(&origin, &subpath)?;
    }

    info!(
        endpoint = %config.endpoint,
        reload_on_disconnect = config.reload_on_disconnect,
        "starting"
    );

    let manager = ConnectionManager::new(config, Greeter { received: 0 });
    let mut states = manager.state_receiver();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            manager.shutdown();
        }
        () = async {
            while states.changed().await.is_ok() {
                let state = *states.borrow();
                info!(%state, attempt = ?state.attempt(), "state changed");
            }
        } => {}
    }

    Ok(())
}
