use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use courier_core::{Announcement, CallRequest, ErrorDescriptor, Message, Options, TransferList};
use courier_fabric::{Channel, Poster};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::completion::Completion;
use crate::error::{Error, Result};
use crate::registry::OperationRegistry;

/// Callee side: serves the operations of a registry over one channel
///
/// Every request is handled to completion before the next one is read. An
/// unknown operation is answered with an `UnknownOperation` error and never
/// stops the dispatcher.
///
/// A failure raised while invoking an operation (a returned `Err` or a
/// panic) is answered with an `InvocationFailure` error when `catchErrors`
/// is set. Otherwise it escapes: [`handle`](Self::handle) returns
/// [`Error::InvocationFailure`] for an `Err` and a panic unwinds through it.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    options: Arc<Options>,
}

impl Dispatcher {
    pub fn new(registry: OperationRegistry, options: Options) -> Self {
        Self {
            registry: Arc::new(registry),
            options: Arc::new(options),
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Capability announcement listing every registered operation
    pub fn announcement(&self) -> Announcement {
        Announcement {
            function_names: self.registry.names(),
        }
    }

    /// Handle one call request, answering through `poster`
    pub fn handle(&self, request: CallRequest, poster: &Poster) -> Result<()> {
        let CallRequest {
            call_id,
            call,
            arguments,
        } = request;
        let completion = Completion::new(call_id, poster.clone());

        let Some(operation) = self.registry.get(&call) else {
            warn!(%call_id, operation = %call, "call for unknown operation");
            return completion.fail(ErrorDescriptor::unknown_operation(&call));
        };

        debug!(%call_id, operation = %call, args = arguments.len(), "dispatching call");

        if !self.options.catch_errors() {
            return operation(arguments, completion).map_err(|e| {
                error!(%call_id, operation = %call, error = %e, "operation failed");
                Error::InvocationFailure {
                    operation: call.clone(),
                    message: e.to_string(),
                }
            });
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            operation(arguments, completion.clone())
        }));
        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => describe_error(e.as_ref()),
            Err(payload) => ErrorDescriptor::invocation_failure(panic_message(payload.as_ref())),
        };

        warn!(%call_id, operation = %call, error = %failure.message, "contained operation failure");
        completion.fail(failure)
    }

    /// Serve requests from `channel` until it closes
    ///
    /// Returns early with the error of an uncontained invocation failure.
    pub async fn serve(self, channel: Channel) -> Result<()> {
        let (poster, mut inbox) = channel.split();

        if self.options.announce_functions() {
            let announcement = self.announcement();
            info!(operations = ?announcement.function_names, "announcing operations");
            poster.post(announcement, &TransferList::none())?;
        }

        while let Some(message) = inbox.receive().await {
            match message {
                Message::Request(request) => match self.handle(request, &poster) {
                    Err(Error::Fabric(courier_fabric::Error::ConnectionClosed)) => {
                        debug!("caller went away, stopping dispatcher");
                        break;
                    }
                    result => result?,
                },
                other => trace!(message = ?other, "ignoring message that is not a call"),
            }
        }

        Ok(())
    }

    /// Spawn [`serve`](Self::serve) on the current runtime
    pub fn start(self, channel: Channel) -> JoinHandle<Result<()>> {
        tokio::spawn(self.serve(channel))
    }
}

fn describe_error(e: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorDescriptor {
    let descriptor = ErrorDescriptor::invocation_failure(e.to_string());

    let mut causes = Vec::new();
    let mut source = e.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    if causes.is_empty() {
        descriptor
    } else {
        descriptor.with_trace(format!("caused by: {}", causes.join("\ncaused by: ")))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish()
    }
}

