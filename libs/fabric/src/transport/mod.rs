use crate::error::Result;

pub mod framing;
pub mod tcp;
pub mod unix;

pub use self::tcp::{TcpFrameSink, TcpFrameSource, TcpTransport, TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{
    UnixFrameSink, UnixFrameSource, UnixTransport, UnixTransportBuilder, UnixTransportListener,
};

/// Transport trait for sending and receiving raw frames
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Sink: FrameSink + 'static;
    type Source: FrameSource + 'static;

    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;

    /// Split into halves that can be driven from separate tasks
    fn into_split(self) -> (Self::Sink, Self::Source);
}

/// Write half of a split transport
#[async_trait::async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Read half of a split transport
#[async_trait::async_trait]
pub trait FrameSource: Send {
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Listener accepting incoming transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport;

    /// Accept the next incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}
