//! Per-connection synchronization loop
//!
//! The loop waits a bounded time for the peer to send something. Inbound
//! frames go to the inbound slot; when the wait times out, the outbound slot
//! is flushed. Any transport failure ends the loop for good.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::error::TransportError;
use crate::network::{ConnectionRole, FrameError, FrameReader, FrameWriter, FramingMode};
use crate::session::SyncSlots;

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for inbound data or the poll timeout
    WaitingForEither,
    /// A frame has started arriving
    ReceivingFrame,
    /// Connection closed; the loop will not run again
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::WaitingForEither => write!(f, "WaitingForEither"),
            LoopState::ReceivingFrame => write!(f, "ReceivingFrame"),
            LoopState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Why a session ended
#[derive(Debug)]
pub enum DisconnectReason {
    /// The peer closed the connection
    PeerClosed,
    /// Reading or writing failed
    Failed(TransportError),
    /// Local interrupt
    Interrupted,
}

impl From<TransportError> for DisconnectReason {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PeerClosed => DisconnectReason::PeerClosed,
            other => DisconnectReason::Failed(other),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::PeerClosed => write!(f, "peer closed the connection"),
            DisconnectReason::Failed(e) => write!(f, "{}", e),
            DisconnectReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Loop parameters
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Wait for inbound data before flushing outbound
    pub poll_timeout: Duration,
    /// Maximum bytes per socket read
    pub chunk_size: usize,
    /// Frame parsing rules
    pub framing: FramingMode,
    /// Largest frame payload sent or accepted
    pub max_frame_bytes: usize,
}

impl From<&NetworkConfig> for LoopConfig {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            poll_timeout: config.poll_timeout(),
            chunk_size: config.chunk_size,
            framing: config.framing,
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// Counters for one connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames written
    pub frames_sent: u64,
    /// Frames read
    pub frames_received: u64,
    /// Bytes written, headers included
    pub bytes_sent: u64,
    /// Payload bytes read
    pub bytes_received: u64,
    /// Read attempts dropped for a bad header
    pub protocol_errors: u64,
}

/// Drives one connection
pub struct SyncLoop<S> {
    stream: S,
    slots: Arc<SyncSlots>,
    reader: FrameReader,
    writer: FrameWriter,
    poll_timeout: Duration,
    role: ConnectionRole,
    state: LoopState,
    stats: LoopStats,
}

impl<S> SyncLoop<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a loop over an established stream
    pub fn new(stream: S, slots: Arc<SyncSlots>, role: ConnectionRole, config: &LoopConfig) -> Self {
        Self {
            stream,
            slots,
            reader: FrameReader::new(config.chunk_size, config.framing, config.max_frame_bytes),
            writer: FrameWriter::new(config.max_frame_bytes),
            poll_timeout: config.poll_timeout,
            role,
            state: LoopState::WaitingForEither,
            stats: LoopStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counters so far
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Runs one wait/receive/flush cycle
    ///
    /// # Errors
    ///
    /// Returns the transport error that ends the connection
    pub async fn step(&mut self) -> Result<(), TransportError> {
        if self.state == LoopState::Terminated {
            return Err(TransportError::PeerClosed);
        }
        self.state = LoopState::WaitingForEither;

        let first = if self.reader.has_buffered() {
            Some(Bytes::new())
        } else {
            match timeout(self.poll_timeout, self.reader.read_chunk(&mut self.stream)).await {
                Ok(Ok(chunk)) => Some(chunk),
                Ok(Err(FrameError::Transport(e))) => return Err(e),
                Ok(Err(FrameError::Protocol(e))) => {
                    warn!("Invalid message received from {}: {}", self.role.peer_name(), e);
                    return Ok(());
                }
                Err(_) => None,
            }
        };

        match first {
            Some(first) => {
                self.state = LoopState::ReceivingFrame;
                self.receive(&first).await?;
                self.state = LoopState::WaitingForEither;
            }
            None => self.flush_outbound().await?,
        }
        Ok(())
    }

    async fn receive(&mut self, first: &[u8]) -> Result<(), TransportError> {
        match self.reader.read_frame_after(&mut self.stream, first).await {
            Ok(payload) => {
                self.stats.frames_received += 1;
                self.stats.bytes_received += payload.len() as u64;
                if self.slots.publish_inbound(payload) {
                    debug!("Replaced a snapshot that was not applied yet");
                }
                Ok(())
            }
            Err(FrameError::Protocol(e)) => {
                self.stats.protocol_errors += 1;
                warn!("Invalid message received from {}: {}", self.role.peer_name(), e);
                Ok(())
            }
            Err(FrameError::Transport(e)) => Err(e),
        }
    }

    async fn flush_outbound(&mut self) -> Result<(), TransportError> {
        let Some(payload) = self.slots.take_outbound() else {
            return Ok(());
        };

        match self.writer.write(&mut self.stream, &payload).await {
            Ok(written) => {
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += written as u64;
                Ok(())
            }
            Err(FrameError::Protocol(e)) => {
                warn!("Not sending snapshot to {}: {}", self.role.peer_name(), e);
                Ok(())
            }
            Err(FrameError::Transport(e)) => Err(e),
        }
    }

    /// Loops until the connection fails, then closes it
    pub async fn run(&mut self) -> DisconnectReason {
        loop {
            if let Err(e) = self.step().await {
                self.close().await;
                return e.into();
            }
        }
    }

    /// Shuts the stream down and enters `Terminated`
    pub async fn close(&mut self) {
        if self.state == LoopState::Terminated {
            return;
        }
        self.state = LoopState::Terminated;
        if let Err(e) = self.stream.shutdown().await {
            debug!("Stream shutdown failed: {}", e);
        }
    }
}
