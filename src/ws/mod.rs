//! Self-healing WebSocket channel.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: owns the channel, reconnects after a fixed delay or restarts the application
//! - [`Lifecycle`](state::Lifecycle): pure state machine the manager task drives
//! - [`Handler`]: receives `on_connect` / `on_message` callbacks
//! - [`Restart`]: what "reload on disconnect" means for the host
//!
//! # Example
//!
//! ```ignore
//! struct Printer;
//!
//! impl Handler for Printer {
//!     fn on_message(&mut self, message: Message, _connection: &Connection) {
//!         println!("{message:?}");
//!     }
//! }
//!
//! let config = Config::for_origin("https://example.com")?;
//! let manager = ConnectionManager::new(config, Printer);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod state;
pub mod traits;

pub use config::Config;
pub use connection::{Connection, ConnectionManager};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use message::Message;
pub use state::ConnectionState;
pub use traits::*;
