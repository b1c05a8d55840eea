//! Length-prefixed framing over a byte stream
//!
//! Framing: `<decimal length>:<payload bytes>`, repeated in both directions.
//!
//! Two parsing modes exist. [`FramingMode::Legacy`] matches the deployed
//! peers byte for byte: the first chunk of a frame must contain the `:`
//! separator, and bytes read past the end of a frame are dropped.
//! [`FramingMode::Buffered`] waits for the separator across reads and keeps
//! surplus bytes as the start of the next frame.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::{ClipSyncError, ProtocolError, TransportError};

/// Frame separator between the length prefix and the payload
pub const SEPARATOR: u8 = b':';

/// Longest length prefix accepted in buffered mode before the separator
/// (`usize::MAX` has 20 decimal digits)
pub const MAX_HEADER_LEN: usize = 20;

/// Result type for framing operations
pub type FrameResult<T> = Result<T, FrameError>;

/// Error type for framing operations
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream failed or was closed; the session is over
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The frame header was malformed; only this read attempt is lost
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<FrameError> for ClipSyncError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(e) => ClipSyncError::Transport(e),
            FrameError::Protocol(e) => ClipSyncError::Protocol(e),
        }
    }
}

/// Frame parsing rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    /// Separator must be in the first chunk; bytes past a frame are dropped
    #[default]
    Legacy,
    /// Header may span reads; bytes past a frame start the next one
    Buffered,
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingMode::Legacy => write!(f, "legacy"),
            FramingMode::Buffered => write!(f, "buffered"),
        }
    }
}

impl FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(FramingMode::Legacy),
            "buffered" => Ok(FramingMode::Buffered),
            other => Err(format!(
                "unknown framing mode {:?} (expected legacy or buffered)",
                other
            )),
        }
    }
}

/// Builds the wire representation of `payload`
pub fn encode_frame(payload: &[u8]) -> BytesMut {
    let header = format!("{}:", payload.len());
    let mut buf = BytesMut::with_capacity(header.len() + payload.len());
    buf.put_slice(header.as_bytes());
    buf.put_slice(payload);
    buf
}

/// Writes one frame as a single logical write
///
/// Returns the number of bytes put on the wire.
///
/// # Errors
///
/// Returns `TransportError::Write` on any send failure
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> FrameResult<usize>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload);
    writer
        .write_all(&frame)
        .await
        .map_err(TransportError::Write)?;
    writer.flush().await.map_err(TransportError::Write)?;

    trace!("Sent frame: {} payload bytes", payload.len());
    Ok(frame.len())
}

/// Parses the decimal length prefix
fn parse_length(header: &[u8]) -> Result<usize, ProtocolError> {
    std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or_else(|| ProtocolError::InvalidLength(String::from_utf8_lossy(header).into_owned()))
}

fn find_separator(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == SEPARATOR)
}

/// Sending half with a payload size limit
#[derive(Debug, Clone)]
pub struct FrameWriter {
    max_frame_bytes: usize,
}

impl FrameWriter {
    /// Creates a writer refusing payloads above `max_frame_bytes`
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Writes `payload` as one frame
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::FrameTooLarge` without writing anything if the
    /// payload exceeds the limit, or a transport error if the write fails
    pub async fn write<W>(&self, writer: &mut W, payload: &[u8]) -> FrameResult<usize>
    where
        W: AsyncWrite + Unpin,
    {
        if payload.len() > self.max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_bytes,
            }
            .into());
        }
        write_frame(writer, payload).await
    }
}

/// Receiving half: accumulates chunks until a frame is complete
#[derive(Debug)]
pub struct FrameReader {
    chunk_size: usize,
    mode: FramingMode,
    max_frame_bytes: usize,
    /// Bytes carried over between frames (buffered mode only)
    pending: BytesMut,
}

impl FrameReader {
    /// Creates a reader
    pub fn new(chunk_size: usize, mode: FramingMode, max_frame_bytes: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            mode,
            max_frame_bytes,
            pending: BytesMut::new(),
        }
    }

    /// Parsing mode in use
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// True if bytes of a following frame are already held
    pub fn has_buffered(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Reads one chunk of at most `chunk_size` bytes
    ///
    /// Performs a single `read`, so dropping the future before it completes
    /// loses no data.
    ///
    /// # Errors
    ///
    /// A zero-length read is reported as `TransportError::PeerClosed`
    pub async fn read_chunk<R>(&self, reader: &mut R) -> FrameResult<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let n = reader.read(&mut buf).await.map_err(TransportError::Read)?;
        if n == 0 {
            return Err(TransportError::PeerClosed.into());
        }
        buf.truncate(n);
        trace!("Read chunk: {} bytes", n);
        Ok(Bytes::from(buf))
    }

    /// Reads one complete frame and returns its payload
    ///
    /// # Errors
    ///
    /// Transport errors end the session; protocol errors drop this attempt
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> FrameResult<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        let first = if self.mode == FramingMode::Buffered && self.has_buffered() {
            Bytes::new()
        } else {
            self.read_chunk(reader).await?
        };
        self.read_frame_after(reader, &first).await
    }

    /// Completes a frame whose first chunk has already been read
    ///
    /// # Errors
    ///
    /// Same as [`FrameReader::read_frame`]
    pub async fn read_frame_after<R>(&mut self, reader: &mut R, first: &[u8]) -> FrameResult<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        let payload = match self.mode {
            FramingMode::Legacy => self.read_legacy(reader, first).await?,
            FramingMode::Buffered => self.read_buffered(reader, first).await?,
        };
        debug!("Received frame: {} bytes", payload.len());
        Ok(payload)
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_bytes,
            });
        }
        Ok(())
    }

    async fn read_legacy<R>(&mut self, reader: &mut R, first: &[u8]) -> FrameResult<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        // No waiting for a late separator: a first chunk without one is invalid.
        let sep = find_separator(first).ok_or(ProtocolError::MissingSeparator)?;
        let size = parse_length(&first[..sep])?;
        self.check_size(size)?;

        let mut body = BytesMut::with_capacity(size);
        body.extend_from_slice(&first[sep + 1..]);
        while body.len() < size {
            let chunk = self.read_chunk(reader).await?;
            body.extend_from_slice(&chunk);
        }

        if body.len() > size {
            debug!(
                "Discarding {} bytes past the end of a {} byte frame",
                body.len() - size,
                size
            );
            body.truncate(size);
        }
        Ok(body.freeze())
    }

    async fn read_buffered<R>(&mut self, reader: &mut R, first: &[u8]) -> FrameResult<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        self.pending.extend_from_slice(first);

        let sep = loop {
            if let Some(pos) = find_separator(&self.pending) {
                break pos;
            }
            if self.pending.len() > MAX_HEADER_LEN {
                self.pending.clear();
                return Err(ProtocolError::HeaderTooLong {
                    max: MAX_HEADER_LEN,
                }
                .into());
            }
            let chunk = self.read_chunk(reader).await?;
            self.pending.extend_from_slice(&chunk);
        };

        let header = self.pending.split_to(sep + 1);
        let size = match parse_length(&header[..sep]).and_then(|size| {
            self.check_size(size)?;
            Ok(size)
        }) {
            Ok(size) => size,
            Err(e) => {
                // Resynchronizing is impossible once the header is lost.
                self.pending.clear();
                return Err(e.into());
            }
        };

        while self.pending.len() < size {
            let chunk = self.read_chunk(reader).await?;
            self.pending.extend_from_slice(&chunk);
        }
        Ok(self.pending.split_to(size).freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const MAX: usize = 1024 * 1024;

    fn legacy(chunk_size: usize) -> FrameReader {
        FrameReader::new(chunk_size, FramingMode::Legacy, MAX)
    }

    fn buffered(chunk_size: usize) -> FrameReader {
        FrameReader::new(chunk_size, FramingMode::Buffered, MAX)
    }

    #[test]
    fn test_encode_frame() {
        assert_eq!(&encode_frame(b"hello")[..], b"5:hello");
        assert_eq!(&encode_frame(b"")[..], b"0:");
    }

    #[test]
    fn test_framing_mode_parse() {
        assert_eq!("legacy".parse::<FramingMode>().unwrap(), FramingMode::Legacy);
        assert_eq!("Buffered".parse::<FramingMode>().unwrap(), FramingMode::Buffered);
        assert!("strict".parse::<FramingMode>().is_err());
    }

    #[tokio::test]
    async fn test_write_then_read_over_duplex() {
        for len in [0usize, 1, 100, 10_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let (mut a, mut b) = tokio::io::duplex(64);

            let expected = payload.clone();
            let writer = tokio::spawn(async move {
                write_frame(&mut a, &expected).await.unwrap();
                a
            });

            let mut reader = legacy(4096);
            let received = reader.read_frame(&mut b).await.unwrap();
            assert_eq!(&received[..], &payload[..], "payload of {} bytes", len);
            writer.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_legacy_accumulates_partial_reads() {
        let mut mock = Builder::new()
            .read(b"11:he")
            .read(b"llo ")
            .read(b"wo")
            .read(b"rld")
            .build();

        let payload = legacy(4096).read_frame(&mut mock).await.unwrap();
        assert_eq!(&payload[..], b"hello world");
    }

    #[tokio::test]
    async fn test_buffered_survives_any_chunk_boundary() {
        let frame = encode_frame(b"the quick brown fox");
        for chunk_size in 1..=frame.len() {
            let mut builder = Builder::new();
            for piece in frame.chunks(chunk_size) {
                builder.read(piece);
            }
            let mut mock = builder.build();

            let payload = buffered(chunk_size).read_frame(&mut mock).await.unwrap();
            assert_eq!(&payload[..], b"the quick brown fox", "chunk size {}", chunk_size);
        }
    }

    #[tokio::test]
    async fn test_legacy_rejects_first_chunk_without_separator() {
        // Buffered mode would wait for ":"; legacy rejects the attempt at once.
        let mut mock = Builder::new().read(b"12").build();

        let err = legacy(4096).read_frame(&mut mock).await.unwrap_err();
        assert!(matches!(err, FrameError::Protocol(ProtocolError::MissingSeparator)));
    }

    #[tokio::test]
    async fn test_invalid_length_prefix() {
        let mut mock = Builder::new().read(b"abc:payload").build();

        let err = legacy(4096).read_frame(&mut mock).await.unwrap_err();
        match err {
            FrameError::Protocol(ProtocolError::InvalidLength(header)) => {
                assert_eq!(header, "abc")
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let mut mock = Builder::new().read(b"-4:data").build();
        let err = legacy(4096).read_frame(&mut mock).await.unwrap_err();
        assert!(matches!(err, FrameError::Protocol(ProtocolError::InvalidLength(_))));
    }

    #[tokio::test]
    async fn test_legacy_discards_bytes_past_frame() {
        // Two frames in one read: the second one is lost in legacy mode.
        let mut mock = Builder::new().read(b"3:abc4:defg").build();
        let mut reader = legacy(4096);

        let payload = reader.read_frame(&mut mock).await.unwrap();
        assert_eq!(&payload[..], b"abc");
        assert!(!reader.has_buffered());

        let err = reader.read_frame(&mut mock).await.unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::PeerClosed)));
    }

    #[tokio::test]
    async fn test_buffered_keeps_bytes_past_frame() {
        let mut mock = Builder::new().read(b"3:abc4:de").read(b"fg").build();
        let mut reader = buffered(4096);

        let first = reader.read_frame(&mut mock).await.unwrap();
        assert_eq!(&first[..], b"abc");
        assert!(reader.has_buffered());

        let second = reader.read_frame(&mut mock).await.unwrap();
        assert_eq!(&second[..], b"defg");
        assert!(!reader.has_buffered());
    }

    #[tokio::test]
    async fn test_peer_closed_mid_frame() {
        let mut mock = Builder::new().read(b"10:abc").build();

        let err = legacy(4096).read_frame(&mut mock).await.unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::PeerClosed)));
    }

    #[tokio::test]
    async fn test_zero_length_payload() {
        let mut mock = Builder::new().read(b"0:").build();

        let payload = legacy(4096).read_frame(&mut mock).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let mut mock = Builder::new().read(b"999999:x").build();
        let mut reader = FrameReader::new(4096, FramingMode::Legacy, 1000);

        let err = reader.read_frame(&mut mock).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Protocol(ProtocolError::FrameTooLarge { size: 999_999, max: 1000 })
        ));
    }

    #[tokio::test]
    async fn test_buffered_header_too_long() {
        let mut mock = Builder::new().read(&[b'7'; 32]).build();

        let err = buffered(4096).read_frame(&mut mock).await.unwrap_err();
        assert!(matches!(err, FrameError::Protocol(ProtocolError::HeaderTooLong { .. })));
    }

    #[tokio::test]
    async fn test_writer_enforces_limit() {
        let mut mock = Builder::new().write(b"2:ok").build();
        let writer = FrameWriter::new(4);

        assert_eq!(writer.write(&mut mock, b"ok").await.unwrap(), 4);

        let err = writer.write(&mut mock, b"too long").await.unwrap_err();
        assert!(matches!(err, FrameError::Protocol(ProtocolError::FrameTooLarge { .. })));
    }
}
