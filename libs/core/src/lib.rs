//! Courier Core - values, wire messages and configuration
//!
//! Shared vocabulary of the courier crates: the dynamic [`Value`] carried in
//! calls, the [`ErrorDescriptor`] failures travel as, the three wire
//! [`Message`] shapes and the [`Options`] recognized at construction.

pub mod descriptor;
pub mod error;
pub mod message;
pub mod options;
pub mod transfer;
pub mod value;

pub use descriptor::ErrorDescriptor;
pub use error::{Error, Result};
pub use message::{Announcement, CallId, CallRequest, CallResponse, Message};
pub use options::{Options, OptionsBuilder};
pub use transfer::TransferList;
pub use value::Value;
