use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    jobs::Launch,
    state::{FlowState, Session},
};

/// How the text of a reply should be rendered by the chat transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextFormat {
    #[default]
    Plain,
    Markdown,
}

/// An interactive button: the label shown to the user and the opaque token sent back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// A message to deliver to the user once the step has been persisted
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub format: TextFormat,
    /// Rows of buttons
    pub choices: Vec<Vec<Choice>>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Markdown,
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<Vec<Choice>>) -> Self {
        self.choices = choices;
        self
    }
}

/// Defines what should happen to the session after a task completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction<St> {
    /// Stay at the current stage and wait for more input
    WaitForInput,
    /// Move to the given stage
    GoTo(St),
    /// Replace the record with the default one (initial stage, no data)
    Reset,
}

/// Result of a task execution
#[derive(Debug)]
pub struct TaskResult<St> {
    pub replies: Vec<Reply>,
    pub next_action: NextAction<St>,
    pub status_message: Option<String>,
    /// Detached work to start after the session has been persisted
    pub launch: Option<Launch>,
}

impl<St> TaskResult<St> {
    pub fn new(next_action: NextAction<St>) -> Self {
        Self {
            replies: Vec::new(),
            next_action,
            status_message: None,
            launch: None,
        }
    }

    pub fn new_with_status(next_action: NextAction<St>, status_message: impl Into<String>) -> Self {
        Self {
            status_message: Some(status_message.into()),
            ..Self::new(next_action)
        }
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }

    pub fn with_launch(mut self, launch: Launch) -> Self {
        self.launch = Some(launch);
        self
    }
}

/// Core trait that every stage handler implements
#[async_trait]
pub trait Task<S: FlowState, E>: Send + Sync {
    /// The stage this task handles
    fn stage(&self) -> S::Stage;

    /// Validate the input, mutate the session and decide the next stage
    async fn run(&self, input: &E, session: &mut Session<S>) -> Result<TaskResult<S::Stage>>;
}
