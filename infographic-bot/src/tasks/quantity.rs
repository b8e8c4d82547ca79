use async_trait::async_trait;
use stage_flow::{NextAction, Reply, Session, Task, TaskResult};
use tracing::debug;

use super::{StageResult, parse_quantity, stale_callback, start_generation};
use crate::{
    deps::Deps,
    models::{ConversationState, Stage, Turn, VariationMode},
    texts,
};

pub struct QuantityTask {
    deps: Deps,
}

impl QuantityTask {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Task<ConversationState, Turn> for QuantityTask {
    fn stage(&self) -> Stage {
        Stage::AwaitQuantity
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        if let Some(stale) = stale_callback(turn, self.stage()) {
            return stale;
        }

        let variant = self.deps.variant;
        let max = variant.max_quantity();
        let Some(quantity) = parse_quantity(turn.event.text(), max) else {
            debug!(chat_id = %turn.chat_id, input = %turn.event.text(), "quantity rejected");
            return Ok(TaskResult::new(NextAction::WaitForInput).reply(texts::quantity_rejected(max)));
        };

        let state = &mut session.state;
        state.quantity = Some(quantity);
        let accepted = texts::quantity_accepted(quantity, state.targets.len());

        if quantity > 1 && variant.asks_variation() {
            return Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitVariation))
                .reply(texts::ask_variation(&accepted)));
        }

        // Without a variation question, repeated images are varied by default
        state.variation = Some(if variant.asks_variation() {
            VariationMode::Uniform
        } else {
            VariationMode::Varied
        });

        if variant.asks_style() {
            return Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitStyle))
                .reply(texts::ask_style(Some(&accepted))));
        }

        let style = state
            .analysis
            .as_ref()
            .and_then(|analysis| analysis.suggested_style.clone())
            .unwrap_or_else(|| texts::DEFAULT_STYLE.to_string());
        state.style = Some(style);

        start_generation(&self.deps, turn, session, Some(Reply::markdown(accepted)))
    }
}
