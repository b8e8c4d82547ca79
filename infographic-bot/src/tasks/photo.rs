use async_trait::async_trait;
use stage_flow::{NextAction, Reply, Session, Task, TaskResult};
use tracing::{info, warn};

use super::StageResult;
use crate::{
    capabilities::bounded,
    deps::Deps,
    models::{ConversationState, ProductAnalysis, Stage, Turn},
    texts,
};

/// Entry stage: wait for a product photo and derive its selling point
pub struct PhotoTask {
    deps: Deps,
}

impl PhotoTask {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    async fn analyze(&self, turn: &Turn, media_ref: &str) -> anyhow::Result<ProductAnalysis> {
        let limit = self.deps.capability_timeout;
        let photo = bounded(
            "photo download",
            limit,
            self.deps.media.fetch(&turn.bot_token, media_ref),
        )
        .await?;
        bounded("photo analysis", limit, self.deps.content.analyze_product(&photo)).await
    }
}

#[async_trait]
impl Task<ConversationState, Turn> for PhotoTask {
    fn stage(&self) -> Stage {
        Stage::AwaitPhoto
    }

    async fn run(&self, turn: &Turn, session: &mut Session<ConversationState>) -> StageResult {
        let Some(media_ref) = turn.event.media_ref() else {
            return Ok(TaskResult::new(NextAction::WaitForInput).reply(Reply::markdown(texts::ASK_PHOTO)));
        };

        // Analysis takes a while; tell the user before it starts
        self.deps.outbox(turn.recipient()).say(texts::ANALYZING).await;

        let analysis = match self.analyze(turn, media_ref).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(chat_id = %turn.chat_id, error = %format!("{e:#}"), "photo analysis failed");
                return Ok(TaskResult::new(NextAction::WaitForInput)
                    .reply(Reply::plain(texts::ANALYSIS_FAILED)));
            }
        };

        info!(chat_id = %turn.chat_id, utp = %analysis.utp, "selling point derived");
        let prompt = texts::utp_approval(&analysis.utp);
        session.state = ConversationState {
            photo_file_id: Some(media_ref.to_string()),
            utp: Some(analysis.utp.clone()),
            analysis: Some(analysis),
            ..ConversationState::default()
        };

        Ok(TaskResult::new(NextAction::GoTo(Stage::AwaitUtpApproval)).reply(prompt))
    }
}
