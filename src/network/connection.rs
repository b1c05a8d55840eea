//! Connection establishment for ClipSync
//!
//! The host binds, listens and accepts exactly one peer; the guest dials the
//! host once. Either way the result is a single duplex TCP stream. Neither
//! side retries: a failure here ends the process.

use std::fmt;
use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::EstablishmentError;

/// Result type for establishment operations
pub type EstablishResult<T> = Result<T, EstablishmentError>;

/// Which end of the connection this process is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Listens and accepts one connection
    Host,

    /// Dials the host
    Guest,
}

impl ConnectionRole {
    /// Name of the other side, used in log messages
    pub fn peer_name(&self) -> &'static str {
        match self {
            ConnectionRole::Host => "guest",
            ConnectionRole::Guest => "host",
        }
    }
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRole::Host => write!(f, "host"),
            ConnectionRole::Guest => write!(f, "guest"),
        }
    }
}

/// Resolves `address:port` to the first socket address
async fn resolve(address: &str, port: u16) -> EstablishResult<SocketAddr> {
    let target = format!("{}:{}", address, port);
    let mut addrs = lookup_host((address, port))
        .await
        .map_err(|source| EstablishmentError::Resolve {
            target: target.clone(),
            source,
        })?;

    addrs.next().ok_or_else(|| EstablishmentError::Resolve {
        target,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
    })
}

fn configure_stream(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }
}

/// Listening side of the host role
pub struct HostListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl HostListener {
    /// Binds a listener on `address:port`
    ///
    /// # Errors
    ///
    /// Returns `EstablishmentError::Bind` if the address is unavailable
    pub async fn bind(address: &str, port: u16) -> EstablishResult<Self> {
        let addr = resolve(address, port).await?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EstablishmentError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| EstablishmentError::Bind { addr, source })?;

        debug!("Listener bound to {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address the listener actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits, without timeout, for the guest to connect
    ///
    /// The listener is consumed: exactly one peer is ever accepted.
    ///
    /// # Errors
    ///
    /// Returns `EstablishmentError::Accept` if accept fails
    pub async fn accept(self) -> EstablishResult<(TcpStream, SocketAddr)> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(EstablishmentError::Accept)?;
        configure_stream(&stream);
        Ok((stream, peer))
    }
}

/// Binds on `address:port`, accepts one guest and returns the stream
///
/// # Errors
///
/// Returns an establishment error if bind or accept fails
pub async fn run_as_host(address: &str, port: u16) -> EstablishResult<TcpStream> {
    let listener = HostListener::bind(address, port).await?;
    info!(
        "Server started at {}. Waiting for {}",
        listener.local_addr(),
        ConnectionRole::Host.peer_name()
    );

    let (stream, peer) = listener.accept().await?;
    info!("Guest connected at {}", peer);
    Ok(stream)
}

/// Dials the host at `address:port` once
///
/// # Errors
///
/// Returns `EstablishmentError::Connect` if the host is unreachable
pub async fn run_as_guest(address: &str, port: u16) -> EstablishResult<TcpStream> {
    let addr = resolve(address, port).await?;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| EstablishmentError::Connect { addr, source })?;
    configure_stream(&stream);

    info!(
        "Established connection with {} at {}",
        ConnectionRole::Guest.peer_name(),
        addr
    );
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_names() {
        assert_eq!(ConnectionRole::Host.peer_name(), "guest");
        assert_eq!(ConnectionRole::Guest.peer_name(), "host");
        assert_eq!(ConnectionRole::Host.to_string(), "host");
    }

    #[tokio::test]
    async fn test_host_accepts_guest() {
        let listener = HostListener::bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr();
        assert!(addr.port() > 0);

        let accept = tokio::spawn(listener.accept());
        let guest = run_as_guest("127.0.0.1", addr.port()).await.unwrap();
        let (host, peer) = accept.await.unwrap().unwrap();

        assert_eq!(peer, guest.local_addr().unwrap());
        assert_eq!(host.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn test_resolve() {
        let addr = resolve("127.0.0.1", 12000).await.unwrap();
        assert_eq!(addr, "127.0.0.1:12000".parse::<SocketAddr>().unwrap());

        let addr = resolve("localhost", 12001).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 12001);
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let first = HostListener::bind("127.0.0.1", 0).await.unwrap();
        let port = first.local_addr().port();

        let err = HostListener::bind("127.0.0.1", port).await.err().unwrap();
        assert!(matches!(err, EstablishmentError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_guest_refused() {
        // Grab a free port, then release it so nothing listens there.
        let port = {
            let listener = HostListener::bind("127.0.0.1", 0).await.unwrap();
            listener.local_addr().port()
        };

        let err = run_as_guest("127.0.0.1", port).await.err().unwrap();
        assert!(matches!(err, EstablishmentError::Connect { .. }));
    }
}
