use async_trait::async_trait;
use stage_flow::{NextAction, Reply, Session, Task, TaskResult};

use super::{StageResult, callbacks::Callback, parsed_callback, stale_callback};
use crate::{
    models::{ConversationState, Stage, Turn},
    texts,
};

/// Uniform series or deliberately different images
pub struct VariationTask;

#[async_trait]
impl Task<ConversationState, Turn> for VariationTask {
    fn stage(&self) -> Stage {
        Stage::AwaitVariation
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        if let Some(stale) = stale_callback(turn, self.stage()) {
            return stale;
        }

        let Some(Callback::Mode(mode)) = parsed_callback(turn) else {
            return Ok(TaskResult::new(NextAction::WaitForInput)
                .reply(Reply::plain(texts::ASK_VARIATION).with_choices(texts::variation_choices())));
        };

        session.state.variation = Some(mode);
        Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitStyle)).reply(texts::ask_style(None)))
    }
}
