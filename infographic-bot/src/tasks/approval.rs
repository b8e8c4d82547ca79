use async_trait::async_trait;
use stage_flow::{NextAction, Reply, Session, Task, TaskResult};
use tracing::info;

use super::{StageResult, callbacks::Callback, parsed_callback, stale_callback, valid_utp};
use crate::{
    models::{ConversationState, Stage, Turn},
    texts,
};

/// Approve the derived selling point or replace it with two or three words
pub struct ApprovalTask;

#[async_trait]
impl Task<ConversationState, Turn> for ApprovalTask {
    fn stage(&self) -> Stage {
        Stage::AwaitUtpApproval
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        if let Some(stale) = stale_callback(turn, self.stage()) {
            return stale;
        }

        let state = &mut session.state;
        match parsed_callback(turn) {
            Some(Callback::ApproveUtp) => {
                state.utp_editing = false;
                return Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitMarketplace))
                    .reply(texts::marketplace_menu()));
            }
            Some(Callback::EditUtp) => {
                state.utp_editing = true;
                return Ok(TaskResult::new(NextAction::WaitForInput).reply(Reply::plain(texts::ASK_UTP_EDIT)));
            }
            _ => {}
        }

        let text = turn.event.text();
        if state.utp_editing && !turn.event.is_callback && !text.is_empty() {
            let Some(utp) = valid_utp(text) else {
                return Ok(TaskResult::new(NextAction::WaitForInput)
                    .reply(Reply::plain(texts::UTP_WORDS_REJECTED)));
            };
            info!(chat_id = %turn.chat_id, utp = %utp, "selling point replaced");
            state.utp = Some(utp.clone());
            state.utp_editing = false;
            return Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitMarketplace))
                .reply(texts::utp_saved(&utp))
                .reply(texts::marketplace_menu()));
        }

        let utp = state.utp.as_deref().unwrap_or("?");
        Ok(TaskResult::new(NextAction::WaitForInput).reply(texts::utp_approval(utp)))
    }
}
