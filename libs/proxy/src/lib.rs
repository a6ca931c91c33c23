//! Courier Proxy - remote calls over asynchronous message channels
//!
//! A callee serves an [`OperationRegistry`] through a [`Dispatcher`]; a
//! caller reaches it through a [`Proxy`], over a single channel or a pool of
//! them. Calls are correlated by id, so answers may arrive in any order.
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{Options, Value};
//! use courier_fabric::Channel;
//! use courier_proxy::{Dispatcher, OperationRegistry, Proxy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (caller, callee) = Channel::pair();
//!
//! let registry = OperationRegistry::builder()
//!     .register("greet", |args, done| {
//!         let name = args.first().and_then(Value::as_str).unwrap_or("stranger");
//!         done.ok(vec![format!("Hello, {}!", name).into()])?;
//!         Ok(())
//!     })
//!     .build();
//! Dispatcher::new(registry, Options::default()).start(callee);
//!
//! let options = Options::builder().function_names(["greet"]).build();
//! let proxy = Proxy::new(caller, options);
//! let greet = proxy.stub("greet").expect("configured");
//! let reply = greet.call(vec!["World".into()]).await?;
//! assert_eq!(reply.value(), Some(&Value::from("Hello, World!")));
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod correlator;
pub mod dispatcher;
pub mod error;
mod instrument;
pub mod proxy;
pub mod registry;
pub mod reply;
mod scheduler;
pub mod stub;

use courier_core::Options;
use courier_fabric::Channel;
use tokio::task::JoinHandle;

pub use completion::Completion;
pub use correlator::{Callback, PendingCallTable};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use proxy::Proxy;
pub use registry::{BoxError, Operation, OperationRegistry, OperationRegistryBuilder};
pub use reply::Reply;
pub use stub::Stub;

/// What [`create`] is handed
pub enum Endpoint {
    /// A caller over one channel
    Channel(Channel),
    /// A caller over a pool of channels
    Pool(Vec<Channel>),
    /// A callee serving `operations` on `channel`
    Callee {
        operations: OperationRegistry,
        channel: Channel,
    },
}

impl From<Channel> for Endpoint {
    fn from(channel: Channel) -> Self {
        Endpoint::Channel(channel)
    }
}

impl From<Vec<Channel>> for Endpoint {
    fn from(channels: Vec<Channel>) -> Self {
        Endpoint::Pool(channels)
    }
}

impl From<(OperationRegistry, Channel)> for Endpoint {
    fn from((operations, channel): (OperationRegistry, Channel)) -> Self {
        Endpoint::Callee {
            operations,
            channel,
        }
    }
}

/// What [`create`] built
pub enum WorkerProxy {
    Caller(Proxy),
    Callee(JoinHandle<Result<()>>),
}

impl WorkerProxy {
    pub fn into_caller(self) -> Option<Proxy> {
        match self {
            WorkerProxy::Caller(proxy) => Some(proxy),
            WorkerProxy::Callee(_) => None,
        }
    }

    pub fn into_callee(self) -> Option<JoinHandle<Result<()>>> {
        match self {
            WorkerProxy::Callee(handle) => Some(handle),
            WorkerProxy::Caller(_) => None,
        }
    }
}

/// Build a caller or install a callee depending on the endpoint's shape
///
/// A channel gives a single-channel [`Proxy`], a list of channels gives a
/// pool, and a registry with its channel starts a [`Dispatcher`]. Must be
/// called inside a tokio runtime.
pub fn create(endpoint: impl Into<Endpoint>, options: Options) -> Result<WorkerProxy> {
    match endpoint.into() {
        Endpoint::Channel(channel) => Ok(WorkerProxy::Caller(Proxy::new(channel, options))),
        Endpoint::Pool(channels) => Ok(WorkerProxy::Caller(Proxy::pool(channels, options)?)),
        Endpoint::Callee {
            operations,
            channel,
        } => Ok(WorkerProxy::Callee(
            Dispatcher::new(operations, options).start(channel),
        )),
    }
}
