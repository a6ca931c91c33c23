use std::net::SocketAddr;
use std::path::Path;

use courier_core::{Message, TransferList};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::transport::{FrameSink, FrameSource, TcpTransport, Transport, UnixTransport};

/// One end of a duplex message channel
///
/// Outbound messages go through the [`Poster`], inbound ones arrive in the
/// [`Inbox`]. The two halves can be split apart and owned by different tasks.
pub struct Channel {
    poster: Poster,
    inbox: Inbox,
}

impl Channel {
    /// Create two connected in-memory ends
    ///
    /// Posting on one end delivers to the other. Arguments are deep-copied on
    /// the way across unless the accompanying transfer list moves them.
    pub fn pair() -> (Channel, Channel) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = Channel {
            poster: Poster::new(b_tx, true),
            inbox: Inbox { rx: a_rx },
        };
        let b = Channel {
            poster: Poster::new(a_tx, true),
            inbox: Inbox { rx: b_rx },
        };
        (a, b)
    }

    /// Drive a byte transport as a message channel
    ///
    /// Spawns a writer task that encodes and sends outbound messages, and a
    /// reader task that receives and decodes inbound ones. Must be called
    /// inside a tokio runtime.
    pub fn from_transport<T, C>(transport: T, codec: C) -> Self
    where
        T: Transport + 'static,
        C: Codec + Clone + 'static,
    {
        let (mut sink, mut source) = transport.into_split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Message>();

        let writer_codec = codec.clone();
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let bytes = match writer_codec.encode(&message) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(error = %e, "dropping message that failed to encode");
                        continue;
                    }
                };
                if let Err(e) = sink.send(&bytes).await {
                    warn!(error = %e, "stream channel write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            loop {
                match source.receive().await {
                    Ok(bytes) => match codec.decode::<Message>(&bytes) {
                        Ok(message) => {
                            if in_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "discarding undecodable frame"),
                    },
                    Err(Error::ConnectionClosed) => {
                        debug!("stream channel closed by peer");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "stream channel read failed");
                        break;
                    }
                }
            }
        });

        Self {
            poster: Poster::new(out_tx, false),
            inbox: Inbox { rx: in_rx },
        }
    }

    /// Open a TCP channel
    pub async fn tcp<C: Codec + Clone + 'static>(addr: SocketAddr, codec: C) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Open a Unix socket channel
    pub async fn unix<C: Codec + Clone + 'static>(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        let transport = UnixTransport::connect(path).await?;
        Ok(Self::from_transport(transport, codec))
    }

    /// Send a message over the channel
    pub fn post(&self, message: impl Into<Message>, transfer: &TransferList) -> Result<()> {
        self.poster.post(message, transfer)
    }

    /// Receive the next message, or `None` once the far side is gone
    pub async fn receive(&mut self) -> Option<Message> {
        self.inbox.receive().await
    }

    /// Receive a message if one is already waiting
    pub fn try_receive(&mut self) -> Option<Message> {
        self.inbox.try_receive()
    }

    pub fn poster(&self) -> &Poster {
        &self.poster
    }

    pub fn split(self) -> (Poster, Inbox) {
        (self.poster, self.inbox)
    }
}

/// Outbound half of a [`Channel`]
///
/// Posting never blocks; messages are buffered until the far side or the
/// writer task takes them.
#[derive(Debug, Clone)]
pub struct Poster {
    tx: mpsc::UnboundedSender<Message>,
    clone_on_post: bool,
}

impl Poster {
    fn new(tx: mpsc::UnboundedSender<Message>, clone_on_post: bool) -> Self {
        Self { tx, clone_on_post }
    }

    /// Send a message, moving the arguments named in `transfer`
    ///
    /// Fails with [`Error::Core`] if `transfer` names a position outside the
    /// message's arguments, and with [`Error::ConnectionClosed`] if nothing
    /// reads from the channel anymore.
    pub fn post(&self, message: impl Into<Message>, transfer: &TransferList) -> Result<()> {
        let mut message = message.into();
        if let Some(arguments) = message.arguments_mut() {
            transfer.validate(arguments.len())?;
            if self.clone_on_post {
                structured_clone(arguments, transfer);
            }
        }
        self.tx.send(message).map_err(|_| Error::ConnectionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Inbound half of a [`Channel`]
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Inbox {
    pub async fn receive(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_receive(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

fn structured_clone(arguments: &mut [courier_core::Value], transfer: &TransferList) {
    for (position, argument) in arguments.iter_mut().enumerate() {
        if !transfer.contains(position) {
            *argument = argument.deep_copy();
        }
    }
}
