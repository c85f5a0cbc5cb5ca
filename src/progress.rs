//! Workflow states and the observer trait for state-change events.
//!
//! A verification run walks a fixed, non-resumable path:
//!
//! ```text
//! Idle ──▶ Rasterizing ──▶ Encoding ──▶ Requesting ──▶ Succeeded
//!   │           │              │             │
//!   └───────────┴──────────────┴─────────────┴──────▶ Failed
//! ```
//!
//! Inject an [`Arc<dyn WorkflowObserver>`] via
//! [`crate::config::VerificationConfigBuilder::observer`] to receive every
//! transition. The observer is the integration point for spinners, logs, or
//! a UI status line; the library knows nothing about how it is displayed.
//!
//! # Example
//!
//! ```rust
//! use certcheck::{VerificationConfig, WorkflowObserver, WorkflowState};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<WorkflowState>>);
//!
//! impl WorkflowObserver for Recorder {
//!     fn on_state_change(&self, _from: WorkflowState, to: WorkflowState) {
//!         self.0.lock().unwrap().push(to);
//!     }
//! }
//!
//! let config = VerificationConfig::builder()
//!     .observer(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::document::DocumentRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a verification run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Rasterizing,
    Encoding,
    Requesting,
    Succeeded,
    Failed,
}

impl WorkflowState {
    /// `Succeeded` and `Failed` end the run; a new attempt starts from `Idle`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded | WorkflowState::Failed)
    }

    /// Whether `self → next` is an edge of the workflow.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        match (self, next) {
            (Idle, Rasterizing)
            | (Rasterizing, Encoding)
            | (Encoding, Requesting)
            | (Requesting, Succeeded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Rasterizing => "rasterizing",
            WorkflowState::Encoding => "encoding",
            WorkflowState::Requesting => "requesting",
            WorkflowState::Succeeded => "succeeded",
            WorkflowState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the workflow as it moves through its states.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: rasterisation
/// runs on a blocking thread, and concurrent runs may share one observer.
pub trait WorkflowObserver: Send + Sync {
    /// Called on every transition, including the final one.
    fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
        let _ = (from, to);
    }

    /// Called once per document after it was rasterised.
    fn on_document_rasterized(&self, role: DocumentRole, pages: usize) {
        let _ = (role, pages);
    }

    /// Called just before the completion request is sent.
    ///
    /// # Arguments
    /// * `images`        — number of page images in the request
    /// * `payload_bytes` — total base64 length of those images
    fn on_request_start(&self, images: usize, payload_bytes: usize) {
        let _ = (images, payload_bytes);
    }

    /// Called when the run fails, before the `→ Failed` transition.
    ///
    /// # Arguments
    /// * `state` — the state the run was in when it failed
    /// * `error` — human-readable error description
    fn on_failure(&self, state: WorkflowState, error: &str) {
        let _ = (state, error);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::VerificationConfig`].
pub type ObserverHandle = Arc<dyn WorkflowObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use WorkflowState::*;

    #[test]
    fn happy_path_edges_are_legal() {
        let path = [Idle, Rasterizing, Encoding, Requesting, Succeeded];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn any_live_state_can_fail() {
        for s in [Idle, Rasterizing, Encoding, Requesting] {
            assert!(s.can_transition_to(Failed), "{s}");
        }
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn no_skips_no_retries() {
        assert!(!Idle.can_transition_to(Requesting));
        assert!(!Rasterizing.can_transition_to(Requesting));
        assert!(!Requesting.can_transition_to(Requesting));
        assert!(!Failed.can_transition_to(Idle));
        assert!(!Failed.can_transition_to(Rasterizing));
        assert!(!Succeeded.can_transition_to(Idle));
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_state_change(Idle, Rasterizing);
        obs.on_document_rasterized(DocumentRole::Invoice, 2);
        obs.on_request_start(3, 1024);
        obs.on_failure(Requesting, "boom");
    }

    #[test]
    fn arc_dyn_observer_records() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<(WorkflowState, WorkflowState)>>);
        impl WorkflowObserver for Recorder {
            fn on_state_change(&self, from: WorkflowState, to: WorkflowState) {
                self.0.lock().unwrap().push((from, to));
            }
        }

        let rec = Arc::new(Recorder::default());
        let handle: ObserverHandle = rec.clone();
        handle.on_state_change(Idle, Rasterizing);
        handle.on_state_change(Rasterizing, Failed);
        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![(Idle, Rasterizing), (Rasterizing, Failed)]
        );
    }

    #[test]
    fn serialises_snake_case() {
        assert_eq!(serde_json::to_string(&Succeeded).unwrap(), "\"succeeded\"");
    }
}
