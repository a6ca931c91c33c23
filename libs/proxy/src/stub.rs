use std::future::Future;
use std::sync::Arc;

use courier_core::{TransferList, Value};
use futures::future::join_all;
use tokio::sync::oneshot;

use crate::correlator::{Callback, ResultSink};
use crate::error::{Error, Result};
use crate::reply::Reply;
use crate::scheduler::{QueuedCall, Scheduler};

/// Caller-side handle for one remote operation
///
/// Every method enqueues its call before returning; the returned futures
/// only wait for the answer. Dropping such a future does not cancel the
/// call.
#[derive(Clone)]
pub struct Stub {
    name: Arc<str>,
    scheduler: Arc<Scheduler>,
}

impl Stub {
    pub(crate) fn new(name: &str, scheduler: Arc<Scheduler>) -> Self {
        Self {
            name: Arc::from(name),
            scheduler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls accepted by the proxy and not answered yet
    pub fn pending_calls(&self) -> usize {
        self.scheduler.pending_calls()
    }

    /// Call the operation and wait for its reply
    pub fn call(&self, arguments: Vec<Value>) -> impl Future<Output = Result<Reply>> + Send + 'static {
        let rx = self.enqueue(arguments, TransferList::none());
        async move { rx.await.map_err(|_| Error::ReplyDropped) }
    }

    /// Call the operation and run `callback` with its reply
    pub fn call_with<F>(&self, arguments: Vec<Value>, callback: F)
    where
        F: Fn(Reply) + Send + Sync + 'static,
    {
        self.queue(
            arguments,
            TransferList::none(),
            Some(ResultSink::Callback(Arc::new(callback))),
        );
    }

    /// Call the operation without waiting for an answer
    pub fn notify(&self, arguments: Vec<Value>) {
        self.queue(arguments, TransferList::none(), None);
    }

    /// Call the operation, moving the arguments at the positions in
    /// `transfer` instead of copying them
    ///
    /// An out of range position fails the call before anything is sent.
    pub fn transfer(
        &self,
        transfer: TransferList,
        arguments: Vec<Value>,
    ) -> impl Future<Output = Result<Reply>> + Send + 'static {
        let queued = match transfer.validate(arguments.len()) {
            Ok(()) => Ok(self.enqueue(arguments, transfer)),
            Err(e) => Err(e),
        };
        async move { queued?.await.map_err(|_| Error::ReplyDropped) }
    }

    /// Callback form of [`transfer`](Self::transfer)
    pub fn transfer_with<F>(&self, transfer: TransferList, arguments: Vec<Value>, callback: F) -> Result<()>
    where
        F: Fn(Reply) + Send + Sync + 'static,
    {
        transfer.validate(arguments.len())?;
        self.queue(
            arguments,
            transfer,
            Some(ResultSink::Callback(Arc::new(callback))),
        );
        Ok(())
    }

    /// Send the call to every channel and wait for all of their replies
    ///
    /// Replies come back in channel order.
    pub fn broadcast(
        &self,
        arguments: Vec<Value>,
    ) -> impl Future<Output = Vec<Result<Reply>>> + Send + 'static {
        let mut receivers = Vec::with_capacity(self.scheduler.channel_count());
        self.scheduler.broadcast(&self.name, arguments, || {
            let (tx, rx) = oneshot::channel();
            receivers.push(rx);
            Some(ResultSink::Reply(tx))
        });

        async move {
            join_all(
                receivers
                    .into_iter()
                    .map(|rx| async move { rx.await.map_err(|_| Error::ReplyDropped) }),
            )
            .await
        }
    }

    /// Send the call to every channel; `callback` runs once per channel reply
    pub fn broadcast_with<F>(&self, arguments: Vec<Value>, callback: F)
    where
        F: Fn(Reply) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        self.scheduler.broadcast(&self.name, arguments, || {
            Some(ResultSink::Callback(Arc::clone(&callback)))
        });
    }

    fn enqueue(&self, arguments: Vec<Value>, transfer: TransferList) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.queue(arguments, transfer, Some(ResultSink::Reply(tx)));
        rx
    }

    fn queue(&self, arguments: Vec<Value>, transfer: TransferList, sink: Option<ResultSink>) {
        self.scheduler.queue_call(QueuedCall {
            operation: self.name.to_string(),
            arguments,
            transfer,
            sink,
        });
    }
}

impl std::fmt::Debug for Stub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub").field("name", &self.name).finish()
    }
}
