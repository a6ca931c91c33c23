use std::time::Instant;

use courier_core::{CallId, Value};
use tracing::info;

/// Start time of one call, labelled `operation(args)`
#[derive(Debug)]
pub(crate) struct CallTimer {
    label: String,
    started: Instant,
}

impl CallTimer {
    pub(crate) fn start(operation: &str, arguments: &[Value]) -> Self {
        let args: Vec<String> = arguments.iter().map(ToString::to_string).collect();
        Self {
            label: format!("{}({})", operation, args.join(", ")),
            started: Instant::now(),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Report the elapsed time of the call
    pub(crate) fn finish(self, call_id: CallId) {
        let elapsed = self.started.elapsed();
        info!(
            label = %self.label,
            %call_id,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "call completed"
        );
    }
}
