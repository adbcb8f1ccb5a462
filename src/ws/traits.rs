//! Collaborator seams of the connection manager.

use super::connection::Connection;
use super::message::Message;

/// Receives channel callbacks.
///
/// Both methods run on the manager task, one at a time, in the order the
/// transport produced the underlying events. The [`Connection`] handed in is the
/// live handle for the current attempt and may be cloned to send later.
///
/// The default implementations only log, mirroring an unconfigured channel.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// impl Handler for Echo {
///     fn on_message(&mut self, message: Message, connection: &Connection) {
///         _ = connection.send(message);
///     }
/// }
/// ```
pub trait Handler: Send + 'static {
    /// Called exactly once each time a connection is established.
    fn on_connect(&mut self, connection: &Connection) {
        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %connection.endpoint(), "ws connected");
        #[cfg(not(feature = "tracing"))]
        let _ = connection;
    }

    /// Called for every inbound data frame while connected.
    fn on_message(&mut self, message: Message, connection: &Connection) {
        #[cfg(feature = "tracing")]
        tracing::info!(attempt = connection.attempt(), ?message, "ws message");
        #[cfg(not(feature = "tracing"))]
        let _ = (&message, connection);
    }
}

/// Handler that keeps the default logging behavior for both callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl Handler for LoggingHandler {}

/// Restarts the hosting application.
///
/// Invoked once when the reconnect delay elapses on a manager configured with
/// `reload_on_disconnect`. What "restart" means is up to the host: re-executing
/// the process, exiting so a supervisor respawns it, or resetting in-process state.
pub trait Restart: Send + Sync + 'static {
    fn restart(&self);
}

impl<F> Restart for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn restart(&self) {
        self();
    }
}

/// Replaces the current process image with a fresh copy of itself, keeping the
/// same arguments. Falls back to exiting when re-execution fails so a
/// supervisor can take over.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReExec;

/// Exit status used when re-executing the process fails.
const REEXEC_FAILURE_STATUS: i32 = 75;

impl Restart for ReExec {
    fn restart(&self) {
        let error = reexec();

        #[cfg(feature = "tracing")]
        tracing::error!("Unable to restart process: {error:?}");
        #[cfg(not(feature = "tracing"))]
        let _ = &error;

        std::process::exit(REEXEC_FAILURE_STATUS);
    }
}

#[cfg(unix)]
fn reexec() -> std::io::Error {
    use std::os::unix::process::CommandExt as _;

    match std::env::current_exe() {
        Ok(exe) => std::process::Command::new(exe)
            .args(std::env::args_os().skip(1))
            .exec(),
        Err(e) => e,
    }
}

#[cfg(not(unix))]
fn reexec() -> std::io::Error {
    let spawned = std::env::current_exe().and_then(|exe| {
        std::process::Command::new(exe)
            .args(std::env::args_os().skip(1))
            .spawn()
    });

    match spawned {
        Ok(_) => std::process::exit(0),
        Err(e) => e,
    }
}
