use serde::{Serialize, de::DeserializeOwned};
use std::{fmt::Debug, hash::Hash};

/// A persisted, typed per-conversation record.
///
/// The record carries its own stage. Absence of a stored record is equivalent
/// to `Self::default()`, so the default value must sit at the initial stage.
pub trait FlowState:
    Clone + Default + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Stage: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn stage(&self) -> Self::Stage;

    fn set_stage(&mut self, stage: Self::Stage);

    /// Validate a record that was just read from storage.
    ///
    /// Implementations return a repaired record (usually the default one) when the
    /// stored data is inconsistent with its stage.
    fn sanitize(self) -> Self {
        self
    }
}

/// A conversation's record together with the key it is stored under
#[derive(Debug, Clone, PartialEq)]
pub struct Session<S> {
    pub id: String,
    pub state: S,
}

impl<S: FlowState> Session<S> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: S::default(),
        }
    }

    pub fn with_state(id: impl Into<String>, state: S) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    pub fn stage(&self) -> S::Stage {
        self.state.stage()
    }

    /// Drop every accumulated field and return to the initial stage
    pub fn reset(&mut self) {
        self.state = S::default();
    }
}
