//! Clipboard sync session
//!
//! Wires one connection to one clipboard: the dispatcher thread on the
//! clipboard side, the sync loop on the network side, the slots between
//! them, and the interrupt that ends everything.

pub mod slots;
pub mod sync_loop;

pub use slots::SyncSlots;
pub use sync_loop::{DisconnectReason, LoopConfig, LoopState, LoopStats, SyncLoop};

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::clipboard::{ClipboardBackend, ClipboardDispatcher, DispatcherConfig, DispatcherHandle};
use crate::config::{Config, NetworkConfig};
use crate::error::{ClipboardError, ClipboardResult, Result};
use crate::network::{run_as_guest, run_as_host, ConnectionRole};

/// Opens the connection for `role`
async fn establish(config: &NetworkConfig, role: ConnectionRole) -> Result<TcpStream> {
    let stream = match role {
        ConnectionRole::Host => run_as_host(&config.address, config.port).await?,
        ConnectionRole::Guest => run_as_guest(&config.address, config.port).await?,
    };
    Ok(stream)
}

/// Clipboard side of a session: the slots and the running dispatcher thread
pub struct ClipboardSession {
    slots: Arc<SyncSlots>,
    dispatcher: DispatcherHandle,
    role: ConnectionRole,
    loop_config: LoopConfig,
}

impl ClipboardSession {
    /// Starts the dispatcher thread with a backend built by `factory`
    ///
    /// Opening the platform clipboard can take a while; the wait happens on
    /// the blocking pool, not on a runtime worker.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, or the backend error if the clipboard
    /// cannot be opened
    pub async fn start<B, F>(config: &Config, role: ConnectionRole, factory: F) -> Result<Self>
    where
        B: ClipboardBackend + 'static,
        F: FnOnce() -> ClipboardResult<B> + Send + 'static,
    {
        config.validate()?;

        let slots = Arc::new(SyncSlots::new());
        let dispatcher_slots = Arc::clone(&slots);
        let dispatcher_config = DispatcherConfig::from(&config.clipboard);
        let dispatcher = tokio::task::spawn_blocking(move || {
            ClipboardDispatcher::<B>::spawn(factory, dispatcher_slots, role, dispatcher_config)
        })
        .await
        .map_err(|e| ClipboardError::Unavailable(format!("clipboard startup failed: {}", e)))??;

        Ok(Self {
            slots,
            dispatcher,
            role,
            loop_config: LoopConfig::from(&config.network),
        })
    }

    /// Slots shared with the dispatcher
    pub fn slots(&self) -> &Arc<SyncSlots> {
        &self.slots
    }

    /// Syncs over `stream` until it ends or `interrupt` completes
    pub async fn sync<S, I>(&self, stream: S, interrupt: I) -> DisconnectReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
        I: Future<Output = ()>,
    {
        sync_until(
            stream,
            Arc::clone(&self.slots),
            self.role,
            &self.loop_config,
            interrupt,
        )
        .await
    }

    /// Stops the dispatcher thread
    pub async fn stop(self) {
        let dispatcher = self.dispatcher;
        if let Err(e) = tokio::task::spawn_blocking(move || dispatcher.stop()).await {
            warn!("Failed to join clipboard dispatcher: {}", e);
        }
    }
}

/// Runs a session until disconnect or Ctrl-C
///
/// # Errors
///
/// Returns configuration, clipboard or establishment errors; once the
/// connection is up, every ending is reported as a [`DisconnectReason`]
pub async fn run_session<B, F>(config: &Config, role: ConnectionRole, factory: F) -> Result<DisconnectReason>
where
    B: ClipboardBackend + 'static,
    F: FnOnce() -> ClipboardResult<B> + Send + 'static,
{
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_session_until(config, role, factory, interrupt).await
}

/// Runs a session until disconnect or until `interrupt` completes
///
/// The clipboard thread starts before the connection, so a change made while
/// the host waits for its guest is sent once the guest arrives.
///
/// # Errors
///
/// Same as [`run_session`]
pub async fn run_session_until<B, F, I>(
    config: &Config,
    role: ConnectionRole,
    factory: F,
    interrupt: I,
) -> Result<DisconnectReason>
where
    B: ClipboardBackend + 'static,
    F: FnOnce() -> ClipboardResult<B> + Send + 'static,
    I: Future<Output = ()>,
{
    let session = ClipboardSession::start(config, role, factory).await?;

    tokio::pin!(interrupt);
    let result = establish_and_sync(&session, &config.network, interrupt.as_mut()).await;
    session.stop().await;

    if let Ok(reason) = &result {
        debug!("Session ended: {}", reason);
        info!("Disconnected");
    }
    result
}

async fn establish_and_sync<I>(
    session: &ClipboardSession,
    config: &NetworkConfig,
    mut interrupt: I,
) -> Result<DisconnectReason>
where
    I: Future<Output = ()> + Unpin,
{
    let stream = tokio::select! {
        stream = establish(config, session.role) => stream?,
        _ = &mut interrupt => return Ok(DisconnectReason::Interrupted),
    };

    Ok(session.sync(stream, interrupt).await)
}

/// Runs the sync loop over an established stream until it ends or
/// `interrupt` completes, then closes the stream
pub async fn sync_until<S, I>(
    stream: S,
    slots: Arc<SyncSlots>,
    role: ConnectionRole,
    config: &LoopConfig,
    interrupt: I,
) -> DisconnectReason
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let mut sync_loop = SyncLoop::new(stream, slots, role, config);

    let reason = tokio::select! {
        reason = sync_loop.run() => reason,
        _ = interrupt => DisconnectReason::Interrupted,
    };
    sync_loop.close().await;

    let stats = sync_loop.stats();
    debug!(
        "Sent {} frames ({} bytes), received {} frames ({} bytes), {} invalid",
        stats.frames_sent,
        stats.bytes_sent,
        stats.frames_received,
        stats.bytes_received,
        stats.protocol_errors
    );
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::network::FramingMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_interrupt_ends_sync() {
        let (local, _peer) = tokio::io::duplex(1024);
        let config = LoopConfig {
            poll_timeout: Duration::from_millis(10),
            chunk_size: 4096,
            framing: FramingMode::Legacy,
            max_frame_bytes: 1024,
        };

        let reason = sync_until(
            local,
            Arc::new(SyncSlots::new()),
            ConnectionRole::Guest,
            &config,
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

        assert!(matches!(reason, DisconnectReason::Interrupted));
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting_for_guest() {
        let mut config = Config::default();
        config.network.port = 0;

        let reason = run_session_until(
            &config,
            ConnectionRole::Host,
            || Ok(MemoryClipboard::new()),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert!(matches!(reason, DisconnectReason::Interrupted));
    }

    #[tokio::test]
    async fn test_start_does_not_block_runtime() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Single-threaded runtime: the ticker only advances if start yields.
        let session = ClipboardSession::start(&Config::default(), ConnectionRole::Host, || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(MemoryClipboard::new())
        })
        .await
        .unwrap();
        let during_start = ticks.load(Ordering::SeqCst);

        ticker.abort();
        session.stop().await;
        assert!(during_start >= 5, "runtime stalled during start ({during_start} ticks)");
    }

    #[tokio::test]
    async fn test_start_reports_backend_failure() {
        let result = ClipboardSession::start(
            &Config::default(),
            ConnectionRole::Guest,
            || -> ClipboardResult<MemoryClipboard> {
                Err(ClipboardError::Unavailable("no display".to_string()))
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(crate::error::ClipSyncError::Clipboard(ClipboardError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_start() {
        let mut config = Config::default();
        config.network.chunk_size = 0;

        let result = run_session_until(
            &config,
            ConnectionRole::Guest,
            || Ok(MemoryClipboard::new()),
            std::future::pending(),
        )
        .await;

        assert!(result.is_err());
    }
}
