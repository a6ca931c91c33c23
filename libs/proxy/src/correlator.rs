use std::collections::HashMap;
use std::sync::Arc;

use courier_core::{CallId, Value};
use tokio::sync::oneshot;

use crate::instrument::CallTimer;
use crate::reply::Reply;

/// Completion callback of a call
///
/// Shared so that a broadcast can hand the same callback to every channel.
pub type Callback = Arc<dyn Fn(Reply) + Send + Sync>;

/// Where the results of a call go
pub(crate) enum ResultSink {
    Callback(Callback),
    Reply(oneshot::Sender<Reply>),
}

impl ResultSink {
    pub(crate) fn deliver(self, results: Vec<Value>) {
        let reply = Reply::new(results);
        match self {
            ResultSink::Callback(callback) => callback(reply),
            // The caller stopped waiting; nothing left to notify
            ResultSink::Reply(tx) => {
                let _ = tx.send(reply);
            }
        }
    }
}

/// Caller-side record of a sent call
pub(crate) struct PendingCall {
    pub(crate) operation: String,
    pub(crate) channel: usize,
    pub(crate) sink: Option<ResultSink>,
    pub(crate) timer: Option<CallTimer>,
}

/// Outstanding calls by id
///
/// Ids are handed out from [`CallId::FIRST`] upwards and never reused. Each
/// entry is removed exactly once; resolving an id that is not in the table
/// (a duplicate or late response) finds nothing.
#[derive(Debug)]
pub struct PendingCallTable<T> {
    next_id: CallId,
    entries: HashMap<CallId, T>,
}

impl<T> PendingCallTable<T> {
    pub fn new() -> Self {
        Self {
            next_id: CallId::FIRST,
            entries: HashMap::new(),
        }
    }

    /// Take the next unused id
    pub fn allocate(&mut self) -> CallId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    pub fn insert(&mut self, id: CallId, entry: T) {
        self.entries.insert(id, entry);
    }

    /// Remove and return the entry for `id`
    pub fn resolve(&mut self, id: CallId) -> Option<T> {
        self.entries.remove(&id)
    }

    /// Remove every entry matching `predicate`, in id order
    pub fn resolve_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<(CallId, T)> {
        let mut ids: Vec<CallId> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|entry| (id, entry)))
            .collect()
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for PendingCallTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
