use async_trait::async_trait;
use stage_flow::{NextAction, Session, Task, TaskResult};

use super::{StageResult, callbacks::Callback, parsed_callback, stale_callback};
use crate::{
    config::FlowVariant,
    models::{ConversationState, Stage, Turn},
    texts,
};

pub struct MarketplaceTask {
    variant: FlowVariant,
}

impl MarketplaceTask {
    pub fn new(variant: FlowVariant) -> Self {
        Self { variant }
    }
}

#[async_trait]
impl Task<ConversationState, Turn> for MarketplaceTask {
    fn stage(&self) -> Stage {
        Stage::AwaitMarketplace
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        if let Some(stale) = stale_callback(turn, self.stage()) {
            return stale;
        }

        let Some(Callback::Target(choice)) = parsed_callback(turn) else {
            return Ok(TaskResult::new(NextAction::WaitForInput).reply(texts::marketplace_menu()));
        };

        session.state.targets = choice.targets();
        Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitQuantity)).reply(texts::ask_quantity(
            &session.state.targets,
            self.variant.max_quantity(),
        )))
    }
}
