use async_trait::async_trait;
use stage_flow::{JobTracker, NextAction, Reply, Session, Task, TaskResult};
use tracing::warn;

use super::StageResult;
use crate::{
    models::{ConversationState, Stage, Turn},
    texts,
};

/// Busy stage while a run is in flight
pub struct GeneratingTask {
    jobs: JobTracker,
}

impl GeneratingTask {
    pub fn new(jobs: JobTracker) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Task<ConversationState, Turn> for GeneratingTask {
    fn stage(&self) -> Stage {
        Stage::Generating
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        if let Some(elapsed) = self.jobs.elapsed(&session.id) {
            return Ok(TaskResult::new_with_status(
                NextAction::WaitForInput,
                format!("generation running for {}s", elapsed.as_secs()),
            )
            .reply(Reply::plain(texts::BUSY)));
        }

        // Stored as generating but nothing runs here, e.g. the process restarted mid-run
        warn!(chat_id = %turn.chat_id, "no generation in flight, resetting stuck session");
        Ok(TaskResult::new(NextAction::Reset).reply(Reply::plain(texts::STALE_GENERATION)))
    }
}
