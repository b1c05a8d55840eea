//! Clipboard event thread
//!
//! Platform clipboards are thread-affine, so one dedicated thread owns the
//! backend. Every tick it applies the snapshot waiting in the inbound slot
//! and, on the watch interval, polls the clipboard fingerprint to detect
//! local changes. It shares nothing with the network loop except the slots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clipboard::applier::{ApplyOutcome, ClipboardApplier};
use crate::clipboard::backend::ClipboardBackend;
use crate::clipboard::watcher::{ClipboardWatcher, SuppressionHandle, WatchOutcome};
use crate::config::ClipboardConfig;
use crate::error::{ClipSyncError, ClipboardError, ClipboardResult, Result};
use crate::network::ConnectionRole;
use crate::session::SyncSlots;

/// Timing of the clipboard thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Sleep between ticks; bounds inbound apply latency
    pub drain_interval: Duration,
    /// Minimum spacing of change polls
    pub watch_interval: Duration,
}

impl From<&ClipboardConfig> for DispatcherConfig {
    fn from(config: &ClipboardConfig) -> Self {
        Self {
            drain_interval: config.drain_interval(),
            watch_interval: config.watch_interval(),
        }
    }
}

/// Detects clipboard changes by comparing fingerprints
#[derive(Debug)]
pub struct ChangeDetector {
    last: u64,
}

impl ChangeDetector {
    /// Records the current state so pre-existing contents are not reported
    pub fn baseline(backend: &mut dyn ClipboardBackend) -> ClipboardResult<Self> {
        Ok(Self {
            last: backend.fingerprint()?,
        })
    }

    /// True if the clipboard changed since the previous poll
    pub fn poll(&mut self, backend: &mut dyn ClipboardBackend) -> ClipboardResult<bool> {
        let current = backend.fingerprint()?;
        if current == self.last {
            return Ok(false);
        }
        self.last = current;
        Ok(true)
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A peer snapshot was written to the clipboard
    pub applied: bool,
    /// Writing a peer snapshot failed, possibly after a partial write
    pub write_failed: bool,
    /// Result of the change notification, if one fired
    pub watch: Option<WatchOutcome>,
}

impl TickReport {
    fn attempted_write(&self) -> bool {
        self.applied || self.write_failed
    }
}

/// Owns the backend and drives watcher and applier
pub struct ClipboardDispatcher<B: ClipboardBackend> {
    backend: B,
    slots: Arc<SyncSlots>,
    watcher: ClipboardWatcher,
    applier: ClipboardApplier,
    detector: ChangeDetector,
    config: DispatcherConfig,
    role: ConnectionRole,
    last_watch: Instant,
}

impl<B: ClipboardBackend> ClipboardDispatcher<B> {
    /// Creates a dispatcher and baselines the clipboard
    ///
    /// # Errors
    ///
    /// Returns a clipboard error if the initial fingerprint cannot be read
    pub fn new(
        mut backend: B,
        slots: Arc<SyncSlots>,
        role: ConnectionRole,
        config: DispatcherConfig,
    ) -> ClipboardResult<Self> {
        let suppression = SuppressionHandle::new();
        let detector = ChangeDetector::baseline(&mut backend)?;
        Ok(Self {
            backend,
            watcher: ClipboardWatcher::new(Arc::clone(&slots), suppression.clone(), role),
            applier: ClipboardApplier::new(suppression, role),
            slots,
            detector,
            config,
            role,
            last_watch: Instant::now(),
        })
    }

    /// Runs one drain + watch pass
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if let Some(payload) = self.slots.take_inbound() {
            match self.applier.on_frame_received(&payload, &mut self.backend) {
                Ok(ApplyOutcome::Applied(_)) => report.applied = true,
                Ok(ApplyOutcome::Empty) => {}
                Err(ClipSyncError::Clipboard(e)) => {
                    report.write_failed = true;
                    warn!("Failed to apply snapshot from {}: {}", self.role.peer_name(), e);
                }
                Err(e) => warn!("Dropping snapshot from {}: {}", self.role.peer_name(), e),
            }
        }

        // After a write attempt, check at once so the notification is matched
        // with its suppression token.
        if !report.attempted_write() && self.last_watch.elapsed() < self.config.watch_interval {
            return report;
        }
        self.last_watch = Instant::now();

        match self.detector.poll(&mut self.backend) {
            Ok(true) => match self.watcher.on_clipboard_changed(&mut self.backend) {
                Ok(outcome) => report.watch = Some(outcome),
                Err(e) => warn!("Failed to read clipboard: {}", e),
            },
            Ok(false) if report.attempted_write() => {
                // Nothing changed, so no notification will come.
                if self.watcher.suppression().release() {
                    debug!("Write attempt left the clipboard unchanged");
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to poll clipboard: {}", e),
        }

        report
    }

    /// Ticks until `shutdown` is raised
    pub fn run(mut self, shutdown: &AtomicBool) {
        info!("Clipboard dispatcher started");
        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            std::thread::sleep(self.config.drain_interval);
        }
        info!("Clipboard dispatcher stopped");
    }
}

impl<B: ClipboardBackend + 'static> ClipboardDispatcher<B> {
    /// Starts the dispatcher on its own thread
    ///
    /// The backend is created on that thread by `factory`. Returns once the
    /// backend is ready, or with its creation error.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or an I/O error if the thread cannot start
    pub fn spawn<F>(
        factory: F,
        slots: Arc<SyncSlots>,
        role: ConnectionRole,
        config: DispatcherConfig,
    ) -> Result<DispatcherHandle>
    where
        F: FnOnce() -> ClipboardResult<B> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("clipboard".to_string())
            .spawn(move || {
                let dispatcher =
                    factory().and_then(|backend| Self::new(backend, slots, role, config));
                match dispatcher {
                    Ok(dispatcher) => {
                        let _ = ready_tx.send(Ok(()));
                        dispatcher.run(&flag);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(DispatcherHandle { thread, shutdown }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e.into())
            }
            Err(_) => Err(ClipboardError::Unavailable(
                "clipboard thread exited during startup".to_string(),
            )
            .into()),
        }
    }
}

/// Running dispatcher thread
pub struct DispatcherHandle {
    thread: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

impl DispatcherHandle {
    /// Signals the thread and waits for it to finish its current tick
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.thread.join().is_err() {
            warn!("Clipboard dispatcher panicked");
        }
    }
}
