use courier_core::{ErrorDescriptor, Value};

/// Results of one answered call
///
/// The first result is `Null` on success or the [`ErrorDescriptor`] the
/// callee failed with; the values follow it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    results: Vec<Value>,
}

impl Reply {
    pub fn new(results: Vec<Value>) -> Self {
        Self { results }
    }

    /// Every result, including the leading error slot
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Value> {
        self.results
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        self.results.first().and_then(Value::as_error)
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Results after the leading error slot
    pub fn values(&self) -> &[Value] {
        self.results.get(1..).unwrap_or(&[])
    }

    /// First value after the error slot
    pub fn value(&self) -> Option<&Value> {
        self.values().first()
    }

    /// Split on the error-first convention
    pub fn into_result(mut self) -> Result<Vec<Value>, ErrorDescriptor> {
        if self.results.is_empty() {
            return Ok(Vec::new());
        }
        match self.results.remove(0) {
            Value::Error(e) => Err(e),
            _ => Ok(self.results),
        }
    }
}
