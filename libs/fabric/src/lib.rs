//! Courier Fabric - message channels and the transports under them
//!
//! A [`Channel`] is one asynchronous duplex message stream to a remote
//! execution context. Channels come from an in-memory [`Channel::pair`], or
//! from a byte transport (TCP, Unix sockets) driven through a codec.
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{CallId, CallRequest, Message, TransferList, Value};
//! use courier_fabric::{Channel, codec::BincodeCodec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // In-memory pair
//! let (caller, mut callee) = Channel::pair();
//! let request = CallRequest {
//!     call_id: CallId::FIRST,
//!     call: "greet".to_string(),
//!     arguments: vec![Value::from("World")],
//! };
//! caller.post(request, &TransferList::none())?;
//! let received: Option<Message> = callee.receive().await;
//!
//! // Or a persistent TCP channel
//! let addr = "127.0.0.1:8080".parse()?;
//! let channel = Channel::tcp(addr, BincodeCodec).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod transport;

// Re-exports for convenience
pub use channel::{Channel, Inbox, Poster};
pub use error::{Error, Result};
