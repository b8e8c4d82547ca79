//! FlowRunner – convenience wrapper that loads a session, executes exactly **one** stage task,
//! and persists the updated session back to storage.
//!
//! The runner is tolerant of its store: a failed read behaves as if the conversation had no
//! record yet, and a failed write is logged while the step still completes. The next event
//! simply observes whatever the store holds.
//!
//! ```rust,ignore
//! // At startup
//! let runner = FlowRunner::new(Arc::new(graph), storage.clone());
//!
//! // Per incoming event
//! let mut result = runner.run(&session_id, &event).await?;
//! for reply in result.replies.drain(..) {
//!     transport.send(reply).await;
//! }
//! if let Some(launch) = result.launch.take() {
//!     launch.spawn();
//! }
//! ```

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    error::Result,
    graph::{ExecutionResult, Graph},
    state::{FlowState, Session},
    storage::SessionStorage,
};

/// High-level helper that orchestrates the _load → execute → save_ pattern.
pub struct FlowRunner<S: FlowState, E> {
    graph: Arc<Graph<S, E>>,
    storage: Arc<dyn SessionStorage<S>>,
}

impl<S: FlowState, E> Clone for FlowRunner<S, E> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<S: FlowState, E: Send + Sync> FlowRunner<S, E> {
    pub fn new(graph: Arc<Graph<S, E>>, storage: Arc<dyn SessionStorage<S>>) -> Self {
        Self { graph, storage }
    }

    pub fn graph(&self) -> &Graph<S, E> {
        &self.graph
    }

    /// Load the session, or a fresh default one when it is absent or unreadable
    pub async fn load(&self, session_id: &str) -> Session<S> {
        match self.storage.get(session_id).await {
            Ok(Some(session)) => Session::with_state(session.id, session.state.sanitize()),
            Ok(None) => Session::new(session_id),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "failed to load session, starting from default record"
                );
                Session::new(session_id)
            }
        }
    }

    /// Execute **exactly one** task for `session_id` and persist the session if it changed.
    ///
    /// Replies and the optional detached launch are handed back to the caller, which
    /// delivers them after this call returns, i.e. after the new state is stored.
    pub async fn run(&self, session_id: &str, input: &E) -> Result<ExecutionResult<S::Stage>> {
        let mut session = self.load(session_id).await;
        let before = session.state.clone();

        debug!(session_id = %session_id, stage = ?session.stage(), "executing stage task");
        let result = self.graph.execute_session(input, &mut session).await?;

        if session.state != before {
            self.persist(&session).await;
        }

        Ok(result)
    }

    /// Overwrite the stored record with the default one
    pub async fn reset(&self, session_id: &str) {
        self.persist(&Session::new(session_id)).await;
    }

    /// Remove the stored record entirely
    pub async fn clear(&self, session_id: &str) {
        if let Err(e) = self.storage.delete(session_id).await {
            error!(session_id = %session_id, error = %e, "failed to delete session");
        }
    }

    /// Save the session, logging instead of failing
    pub async fn persist(&self, session: &Session<S>) {
        if let Err(e) = self.storage.save(session).await {
            error!(session_id = %session.id, error = %e, "failed to save session");
        }
    }
}
