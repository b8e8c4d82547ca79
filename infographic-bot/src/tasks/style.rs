use async_trait::async_trait;
use stage_flow::{NextAction, Reply, Session, Task, TaskResult};
use tracing::info;

use super::{StageResult, callbacks::Callback, parsed_callback, stale_callback, start_generation};
use crate::{
    deps::Deps,
    models::{ConversationState, Stage, Turn},
    texts,
};

/// Background style, free text or a preset button; launches generation
pub struct StyleTask {
    deps: Deps,
}

impl StyleTask {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Task<ConversationState, Turn> for StyleTask {
    fn stage(&self) -> Stage {
        Stage::AwaitStyle
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        if let Some(stale) = stale_callback(turn, self.stage()) {
            return stale;
        }

        let style = match parsed_callback(turn) {
            Some(Callback::Style(preset)) => Some(preset.to_string()),
            _ if turn.event.is_callback => None,
            _ => Some(turn.event.text().to_string()).filter(|text| !text.is_empty()),
        };
        let Some(style) = style else {
            return Ok(TaskResult::new(NextAction::WaitForInput)
                .reply(Reply::plain(texts::ASK_STYLE_AGAIN).with_choices(texts::style_choices())));
        };

        info!(chat_id = %turn.chat_id, style = %style, "style chosen");
        session.state.style = Some(style);
        start_generation(&self.deps, turn, session, None)
    }
}
