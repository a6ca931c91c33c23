use courier_core::{CallId, CallResponse, ErrorDescriptor, TransferList, Value};
use courier_fabric::Poster;

use crate::error::Result;

/// Handle an operation uses to answer the call it was invoked for
///
/// Each invocation of [`done`](Self::done) (or its shorthands) emits one
/// response. Nothing deduplicates them: an operation that completes twice
/// answers twice, and the caller drops the second answer as stale.
#[derive(Debug, Clone)]
pub struct Completion {
    call_id: CallId,
    poster: Poster,
}

impl Completion {
    pub(crate) fn new(call_id: CallId, poster: Poster) -> Self {
        Self { call_id, poster }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Answer with `[error or null, ...values]`
    pub fn done(&self, error: Option<ErrorDescriptor>, values: Vec<Value>) -> Result<()> {
        self.send(error, values, &TransferList::none())
    }

    pub fn ok(&self, values: Vec<Value>) -> Result<()> {
        self.done(None, values)
    }

    pub fn fail(&self, error: ErrorDescriptor) -> Result<()> {
        self.done(Some(error), Vec::new())
    }

    /// Answer like [`done`](Self::done), moving the values at the positions in
    /// `transfer` instead of copying them
    ///
    /// Positions index `values`; the leading error slot is not counted.
    pub fn transfer(
        &self,
        transfer: TransferList,
        error: Option<ErrorDescriptor>,
        values: Vec<Value>,
    ) -> Result<()> {
        self.send(error, values, &transfer.shifted(1))
    }

    fn send(
        &self,
        error: Option<ErrorDescriptor>,
        values: Vec<Value>,
        transfer: &TransferList,
    ) -> Result<()> {
        let mut arguments = Vec::with_capacity(values.len() + 1);
        arguments.push(error.map_or(Value::Null, Value::Error));
        arguments.extend(values);

        let response = CallResponse {
            call_response: self.call_id,
            arguments,
        };
        self.poster.post(response, transfer)?;
        Ok(())
    }
}
