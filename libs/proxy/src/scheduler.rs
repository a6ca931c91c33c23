use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use courier_core::{
    CallId, CallRequest, CallResponse, ErrorDescriptor, Message, Options, TransferList, Value,
};
use courier_fabric::{Inbox, Poster};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::correlator::{PendingCall, PendingCallTable, ResultSink};
use crate::instrument::CallTimer;

/// How queued calls are assigned to channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// One channel, every call sent as soon as it is made
    Direct,
    /// First available channel takes the head of the queue
    Pooled,
}

/// A call waiting for a channel
pub(crate) struct QueuedCall {
    pub(crate) operation: String,
    pub(crate) arguments: Vec<Value>,
    pub(crate) transfer: TransferList,
    pub(crate) sink: Option<ResultSink>,
}

struct PoolState {
    available: Vec<bool>,
    closed: Vec<bool>,
    queue: VecDeque<QueuedCall>,
    pending_calls: usize,
    table: PendingCallTable<PendingCall>,
    capabilities: Vec<String>,
}

/// Work left after a state transition, run once the lock is released
#[derive(Default)]
struct Effects {
    deliveries: Vec<(ResultSink, Vec<Value>)>,
    deadlines: Vec<CallId>,
}

/// Caller-side scheduler over one or more channels
///
/// All queue, availability and table transitions for one event happen under
/// a single lock. Completions run after it is released so they may issue new
/// calls.
pub(crate) struct Scheduler {
    mode: Mode,
    state: Mutex<PoolState>,
    posters: Vec<Poster>,
    options: Arc<Options>,
    capabilities: watch::Sender<Vec<String>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Build the scheduler and start one reader task per inbox
    pub(crate) fn start(mode: Mode, channels: Vec<(Poster, Inbox)>, options: Arc<Options>) -> Arc<Self> {
        let configured = options.function_names().to_vec();
        let (capabilities, _) = watch::channel(configured.clone());
        let (posters, inboxes): (Vec<Poster>, Vec<Inbox>) = channels.into_iter().unzip();

        let scheduler = Arc::new(Self {
            mode,
            state: Mutex::new(PoolState {
                available: vec![true; posters.len()],
                closed: vec![false; posters.len()],
                queue: VecDeque::new(),
                pending_calls: 0,
                table: PendingCallTable::new(),
                capabilities: configured,
            }),
            posters,
            options,
            capabilities,
            readers: Mutex::new(Vec::new()),
        });

        let readers = inboxes
            .into_iter()
            .enumerate()
            .map(|(channel, inbox)| spawn_reader(Arc::downgrade(&scheduler), channel, inbox))
            .collect();
        *scheduler.readers.lock() = readers;

        scheduler
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.posters.len()
    }

    pub(crate) fn pending_calls(&self) -> usize {
        self.state.lock().pending_calls
    }

    pub(crate) fn queued_calls(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().table.len()
    }

    pub(crate) fn capabilities(&self) -> Vec<String> {
        self.state.lock().capabilities.clone()
    }

    pub(crate) fn subscribe_capabilities(&self) -> watch::Receiver<Vec<String>> {
        self.capabilities.subscribe()
    }

    /// Append a call to the queue and dispatch whatever the channels can take
    pub(crate) fn queue_call(self: &Arc<Self>, call: QueuedCall) {
        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            state.queue.push_back(call);
            state.pending_calls += 1;
            self.flush(&mut state, &mut effects);
        }
        self.apply(effects);
    }

    /// Send a call to every channel, bypassing the queue and availability
    ///
    /// `sink` is asked for one result sink per channel.
    pub(crate) fn broadcast(
        self: &Arc<Self>,
        operation: &str,
        arguments: Vec<Value>,
        mut sink: impl FnMut() -> Option<ResultSink>,
    ) {
        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            for channel in 0..self.posters.len() {
                state.pending_calls += 1;
                let call = QueuedCall {
                    operation: operation.to_string(),
                    arguments: arguments.clone(),
                    transfer: TransferList::none(),
                    sink: sink(),
                };
                self.send_on(&mut state, channel, call, &mut effects);
            }
        }
        self.apply(effects);
    }

    fn on_response(self: &Arc<Self>, channel: usize, response: CallResponse) {
        let call_id = response.call_response;
        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            let Some(pending) = state.table.resolve(call_id) else {
                trace!(%call_id, channel, "discarding stale response");
                return;
            };

            state.pending_calls -= 1;
            if self.mode == Mode::Pooled && !state.closed[channel] {
                state.available[channel] = true;
            }
            if let Some(timer) = pending.timer {
                timer.finish(call_id);
            }
            if let Some(sink) = pending.sink {
                effects.deliveries.push((sink, response.arguments));
            }
            self.flush(&mut state, &mut effects);
        }
        self.apply(effects);
    }

    /// Give up on a call whose deadline passed
    fn abandon(self: &Arc<Self>, call_id: CallId) {
        let Some(timeout) = self.options.call_timeout() else {
            return;
        };

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            let Some(pending) = state.table.resolve(call_id) else {
                return;
            };

            let label = pending.timer.as_ref().map(CallTimer::label);
            warn!(%call_id, operation = %pending.operation, ?label, "call deadline passed");

            state.pending_calls -= 1;
            if self.mode == Mode::Pooled && !state.closed[pending.channel] {
                state.available[pending.channel] = true;
            }
            if let Some(sink) = pending.sink {
                let error = ErrorDescriptor::call_timeout(&pending.operation, timeout.as_millis() as u64);
                effects.deliveries.push((sink, vec![Value::Error(error)]));
            }
            self.flush(&mut state, &mut effects);
        }
        self.apply(effects);
    }

    /// Fail the calls a closed channel can no longer answer
    fn on_closed(self: &Arc<Self>, channel: usize) {
        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            state.closed[channel] = true;
            state.available[channel] = false;

            for (call_id, pending) in state.table.resolve_where(|call| call.channel == channel) {
                warn!(%call_id, operation = %pending.operation, channel, "channel closed with call in flight");
                state.pending_calls -= 1;
                if let Some(sink) = pending.sink {
                    let error = ErrorDescriptor::channel_closed(&pending.operation);
                    effects.deliveries.push((sink, vec![Value::Error(error)]));
                }
            }
            self.flush(&mut state, &mut effects);
        }
        self.apply(effects);
    }

    fn on_announcement(&self, names: Vec<String>) {
        let mut state = self.state.lock();
        for name in names {
            if !state.capabilities.contains(&name) {
                state.capabilities.push(name);
            }
        }
        debug!(operations = ?state.capabilities, "callee announced operations");
        self.capabilities.send_replace(state.capabilities.clone());
    }

    /// Pair queued calls with channels
    fn flush(&self, state: &mut PoolState, effects: &mut Effects) {
        match self.mode {
            Mode::Direct => {
                while let Some(call) = state.queue.pop_front() {
                    self.send_on(state, 0, call, effects);
                }
            }
            Mode::Pooled => {
                for channel in 0..self.posters.len() {
                    if state.queue.is_empty() {
                        break;
                    }
                    if !state.available[channel] {
                        continue;
                    }
                    if self.posters[channel].is_closed() {
                        warn!(channel, "channel closed, retiring it from the pool");
                        state.available[channel] = false;
                        state.closed[channel] = true;
                        continue;
                    }
                    if let Some(call) = state.queue.pop_front() {
                        state.available[channel] = false;
                        self.send_on(state, channel, call, effects);
                    }
                }

                if !state.queue.is_empty() && state.closed.iter().all(|&closed| closed) {
                    warn!(queued = state.queue.len(), "every channel in the pool is closed");
                    while let Some(call) = state.queue.pop_front() {
                        state.pending_calls -= 1;
                        if let Some(sink) = call.sink {
                            let error = ErrorDescriptor::channel_closed(&call.operation);
                            effects.deliveries.push((sink, vec![Value::Error(error)]));
                        }
                    }
                }
            }
        }
        debug_assert_eq!(state.pending_calls, state.queue.len() + state.table.len());
    }

    /// Assign an id, record the call and hand it to the channel
    fn send_on(&self, state: &mut PoolState, channel: usize, call: QueuedCall, effects: &mut Effects) {
        let QueuedCall {
            operation,
            arguments,
            transfer,
            sink,
        } = call;

        let call_id = state.table.allocate();
        let timer = self
            .options
            .time_calls()
            .then(|| CallTimer::start(&operation, &arguments));
        let request = CallRequest {
            call_id,
            call: operation.clone(),
            arguments,
        };

        match self.posters[channel].post(request, &transfer) {
            Ok(()) => {
                trace!(%call_id, %operation, channel, "call sent");
                state.table.insert(
                    call_id,
                    PendingCall {
                        operation,
                        channel,
                        sink,
                        timer,
                    },
                );
                if self.options.call_timeout().is_some() {
                    effects.deadlines.push(call_id);
                }
            }
            Err(e) => {
                warn!(%call_id, %operation, channel, error = %e, "failed to send call");
                state.pending_calls -= 1;
                if let Some(sink) = sink {
                    let error = ErrorDescriptor::channel_closed(&operation);
                    effects.deliveries.push((sink, vec![Value::Error(error)]));
                }
            }
        }
    }

    fn apply(self: &Arc<Self>, effects: Effects) {
        if let Some(timeout) = self.options.call_timeout() {
            for call_id in effects.deadlines {
                let scheduler = Arc::downgrade(self);
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    if let Some(scheduler) = scheduler.upgrade() {
                        scheduler.abandon(call_id);
                    }
                });
            }
        }

        for (sink, results) in effects.deliveries {
            sink.deliver(results);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for reader in self.readers.get_mut().drain(..) {
            reader.abort();
        }
    }
}

fn spawn_reader(scheduler: Weak<Scheduler>, channel: usize, mut inbox: Inbox) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbox.receive().await {
            let Some(live) = scheduler.upgrade() else {
                break;
            };
            match message {
                Message::Response(response) => live.on_response(channel, response),
                Message::Announcement(announcement) => {
                    live.on_announcement(announcement.function_names)
                }
                Message::Request(request) => {
                    debug!(call_id = %request.call_id, channel, "ignoring call request sent to a caller")
                }
            }
        }
        debug!(channel, "channel inbox closed");
        if let Some(live) = scheduler.upgrade() {
            live.on_closed(channel);
        }
    })
}
