use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use courier_core::Value;

use crate::completion::Completion;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A callable operation
///
/// Receives the call's arguments and the completion handle for its answer.
/// Returning `Err`, or panicking, is a synchronous invocation failure.
pub type Operation = Arc<dyn Fn(Vec<Value>, Completion) -> Result<(), BoxError> + Send + Sync>;

/// Operations a dispatcher serves, by name
///
/// Fixed once built.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, Operation>,
}

impl OperationRegistry {
    pub fn builder() -> OperationRegistryBuilder {
        OperationRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.operations.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FromIterator<(String, Operation)> for OperationRegistry {
    fn from_iter<I: IntoIterator<Item = (String, Operation)>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

/// Builder for [`OperationRegistry`]
#[derive(Default)]
pub struct OperationRegistryBuilder {
    operations: BTreeMap<String, Operation>,
}

impl OperationRegistryBuilder {
    /// Register `operation` under `name`, replacing any earlier registration
    pub fn register<F>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(Vec<Value>, Completion) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Arc::new(operation));
        self
    }

    pub fn build(self) -> OperationRegistry {
        OperationRegistry {
            operations: self.operations,
        }
    }
}
