use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Positions of the arguments a send should move instead of copy
///
/// A transfer list always travels next to a message, never inside it. It
/// names a subset of the message's argument array by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferList {
    positions: Vec<usize>,
}

impl TransferList {
    pub fn new(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut positions: Vec<usize> = positions.into_iter().collect();
        positions.sort_unstable();
        positions.dedup();
        Self { positions }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.positions.binary_search(&position).is_ok()
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Check that every position names one of `len` arguments
    pub fn validate(&self, len: usize) -> Result<()> {
        match self.positions.iter().find(|&&p| p >= len) {
            Some(&index) => Err(Error::InvalidTransfer { index, len }),
            None => Ok(()),
        }
    }

    /// Same list with every position moved by `by`
    pub fn shifted(&self, by: usize) -> Self {
        Self {
            positions: self.positions.iter().map(|p| p + by).collect(),
        }
    }
}

impl FromIterator<usize> for TransferList {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::new(iter)
    }
}
