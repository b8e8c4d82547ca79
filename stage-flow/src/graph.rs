use std::{collections::HashMap, sync::Arc};
use tracing::warn;

use crate::{
    error::{FlowError, Result},
    jobs::Launch,
    state::{FlowState, Session},
    task::{NextAction, Reply, Task},
};

/// Transition table: one task per stage
pub struct Graph<S: FlowState, E> {
    pub id: String,
    tasks: HashMap<S::Stage, Arc<dyn Task<S, E>>>,
    start_stage: Option<S::Stage>,
}

impl<S: FlowState, E: Send + Sync> Graph<S, E> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            start_stage: None,
        }
    }

    /// Register a task under the stage it handles
    pub fn add_task(&mut self, task: Arc<dyn Task<S, E>>) -> &mut Self {
        let stage = task.stage();
        let is_first = self.tasks.is_empty();
        self.tasks.insert(stage, task);

        // The first registered task is the entry point unless told otherwise
        if is_first {
            self.start_stage = Some(stage);
        }

        self
    }

    pub fn set_start_stage(&mut self, stage: S::Stage) -> &mut Self {
        if self.tasks.contains_key(&stage) {
            self.start_stage = Some(stage);
        }
        self
    }

    pub fn start_stage(&self) -> Option<S::Stage> {
        self.start_stage
    }

    pub fn has_task(&self, stage: S::Stage) -> bool {
        self.tasks.contains_key(&stage)
    }

    /// Task for `stage`, falling back to the start task when the stage has none
    pub fn task_for(&self, stage: S::Stage) -> Option<Arc<dyn Task<S, E>>> {
        if let Some(task) = self.tasks.get(&stage) {
            return Some(task.clone());
        }

        let start = self.start_stage?;
        warn!(
            graph_id = %self.id,
            stage = ?stage,
            fallback = ?start,
            "no task registered for stage, routing to start task"
        );
        self.tasks.get(&start).cloned()
    }

    /// Run the task for the session's current stage and apply its next action.
    ///
    /// Exactly one task runs per call. The caller is responsible for persisting the
    /// session, delivering `replies` and spawning `launch`.
    pub async fn execute_session(
        &self,
        input: &E,
        session: &mut Session<S>,
    ) -> Result<ExecutionResult<S::Stage>> {
        let from = session.stage();
        let task = self
            .task_for(from)
            .ok_or_else(|| FlowError::TaskNotFound(format!("{from:?}")))?;

        let result = task.run(input, session).await?;

        let status = match result.next_action {
            NextAction::WaitForInput => ExecutionStatus::WaitingForInput,
            NextAction::GoTo(to) => {
                if !self.tasks.contains_key(&to) {
                    return Err(FlowError::TaskNotFound(format!("{to:?}")));
                }
                session.state.set_stage(to);
                ExecutionStatus::Transitioned { from, to }
            }
            NextAction::Reset => {
                session.reset();
                ExecutionStatus::Reset
            }
        };

        Ok(ExecutionResult {
            replies: result.replies,
            status,
            status_message: result.status_message,
            launch: result.launch,
        })
    }
}

/// Builder for creating graphs
pub struct GraphBuilder<S: FlowState, E> {
    graph: Graph<S, E>,
}

impl<S: FlowState, E: Send + Sync> GraphBuilder<S, E> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(id),
        }
    }

    pub fn add_task(mut self, task: Arc<dyn Task<S, E>>) -> Self {
        self.graph.add_task(task);
        self
    }

    pub fn set_start_stage(mut self, stage: S::Stage) -> Self {
        self.graph.set_start_stage(stage);
        self
    }

    pub fn build(self) -> Graph<S, E> {
        self.graph
    }
}

/// Outcome of one step
#[derive(Debug)]
pub struct ExecutionResult<St> {
    pub replies: Vec<Reply>,
    pub status: ExecutionStatus<St>,
    pub status_message: Option<String>,
    pub launch: Option<Launch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus<St> {
    /// Stayed at the same stage
    WaitingForInput,
    /// Moved to another stage
    Transitioned { from: St, to: St },
    /// Record replaced by the default one
    Reset,
}
