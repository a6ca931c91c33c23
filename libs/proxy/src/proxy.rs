use std::future::Future;
use std::sync::Arc;

use courier_core::{Options, Value};
use courier_fabric::Channel;

use crate::error::{Error, Result};
use crate::reply::Reply;
use crate::scheduler::{Mode, Scheduler};
use crate::stub::Stub;

/// Caller-side surface over one channel or a pool of channels
///
/// A single-channel proxy sends every call as soon as it is made. A pool
/// keeps at most one queued call per channel in flight: calls wait in a
/// FIFO queue and the first channel to become available takes the head.
///
/// Stubs are built from a known list of operation names, either configured
/// through `functionNames` or announced by the callee.
#[derive(Clone)]
pub struct Proxy {
    scheduler: Arc<Scheduler>,
}

impl Proxy {
    /// Proxy calls over a single channel
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(channel: Channel, options: Options) -> Self {
        Self {
            scheduler: Scheduler::start(Mode::Direct, vec![channel.split()], Arc::new(options)),
        }
    }

    /// Proxy calls over a pool of channels
    pub fn pool(channels: Vec<Channel>, options: Options) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::EmptyPool);
        }
        let channels = channels.into_iter().map(Channel::split).collect();
        Ok(Self {
            scheduler: Scheduler::start(Mode::Pooled, channels, Arc::new(options)),
        })
    }

    pub fn options(&self) -> &Options {
        self.scheduler.options()
    }

    pub fn is_pool(&self) -> bool {
        self.scheduler.mode() == Mode::Pooled
    }

    pub fn channel_count(&self) -> usize {
        self.scheduler.channel_count()
    }

    /// Calls accepted and not answered yet, queued ones included
    pub fn pending_calls(&self) -> usize {
        self.scheduler.pending_calls()
    }

    /// Calls waiting for a channel
    pub fn queued_calls(&self) -> usize {
        self.scheduler.queued_calls()
    }

    /// Calls sent and not answered yet
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Operation names known so far
    pub fn capabilities(&self) -> Vec<String> {
        self.scheduler.capabilities()
    }

    /// Wait until at least one operation name is known and return them all
    pub async fn negotiate(&self) -> Result<Vec<String>> {
        let mut rx = self.scheduler.subscribe_capabilities();
        let names = rx
            .wait_for(|names| !names.is_empty())
            .await
            .map_err(|_| Error::ReplyDropped)?;
        Ok(names.to_vec())
    }

    /// Stub for a known operation
    pub fn stub(&self, name: &str) -> Option<Stub> {
        self.scheduler
            .capabilities()
            .iter()
            .any(|known| known == name)
            .then(|| Stub::new(name, Arc::clone(&self.scheduler)))
    }

    /// One stub per known operation
    pub fn stubs(&self) -> Vec<Stub> {
        self.scheduler
            .capabilities()
            .iter()
            .map(|name| Stub::new(name, Arc::clone(&self.scheduler)))
            .collect()
    }

    /// Stub for `name` whether or not the callee is known to serve it
    pub fn operation(&self, name: &str) -> Stub {
        Stub::new(name, Arc::clone(&self.scheduler))
    }

    /// Call `name` and wait for its reply
    pub fn call(
        &self,
        name: &str,
        arguments: Vec<Value>,
    ) -> impl Future<Output = Result<Reply>> + Send + 'static {
        self.operation(name).call(arguments)
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("channels", &self.channel_count())
            .field("pool", &self.is_pool())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
