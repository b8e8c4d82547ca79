//! One task per dialogue stage.

pub mod approval;
pub mod callbacks;
pub mod generating;
pub mod marketplace;
pub mod photo;
pub mod quantity;
pub mod style;
pub mod variation;

pub use approval::ApprovalTask;
pub use generating::GeneratingTask;
pub use marketplace::MarketplaceTask;
pub use photo::PhotoTask;
pub use quantity::QuantityTask;
pub use style::StyleTask;
pub use variation::VariationTask;

use stage_flow::{FlowError, Launch, NextAction, Reply, Result, Session, TaskResult};
use tracing::{debug, warn};

use crate::{
    deps::Deps,
    models::{ConversationState, Stage, Turn},
    pipeline::{Orchestrator, PipelineRun},
    texts,
};
use callbacks::Callback;

pub(crate) type StageResult = Result<TaskResult<Stage>>;

/// Accepted selling-point edit: two or three words
pub fn valid_utp(text: &str) -> Option<String> {
    let words = text.split_whitespace().count();
    (2..=3).contains(&words).then(|| text.trim().to_string())
}

/// Accepted quantity: a whole number in `1..=max`
pub fn parse_quantity(text: &str, max: u32) -> Option<u32> {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|quantity| (1..=max).contains(quantity))
}

fn parsed_callback(turn: &Turn) -> Option<Callback> {
    turn.event.callback_data().and_then(Callback::parse)
}

/// Buttons from earlier prompts (double taps, retries) are dropped without a reply
fn stale_callback(turn: &Turn, current: Stage) -> Option<StageResult> {
    let callback = parsed_callback(turn)?;
    if callback.is_stale_at(current) {
        debug!(chat_id = %turn.chat_id, ?callback, stage = %current, "ignoring stale callback");
        return Some(Ok(TaskResult::new(NextAction::WaitForInput)));
    }
    None
}

/// Snapshot the session, claim the conversation's job slot and hand back the detached run
fn start_generation(
    deps: &Deps,
    turn: &Turn,
    session: &Session<ConversationState>,
    lead: Option<Reply>,
) -> StageResult {
    let run = PipelineRun::snapshot(&session.id, turn.recipient(), &session.state)
        .map_err(|e| FlowError::TaskExecutionFailed(e.to_string()))?;

    let Some(permit) = deps.jobs.try_acquire(&session.id) else {
        warn!(chat_id = %turn.chat_id, "generation already in flight for this chat");
        return Ok(TaskResult::new(NextAction::GoTo(Stage::Generating)).reply(Reply::plain(texts::BUSY)));
    };

    let total = run.total();
    let orchestrator = Orchestrator::new(deps.clone());
    let recovery = orchestrator.clone();
    let failed_run = run.clone();

    let launch = Launch::new(permit, async move { orchestrator.execute(run).await })
        .with_recovery(move |reason| async move { recovery.fail(&failed_run, &reason).await });

    let mut result = TaskResult::new_with_status(
        NextAction::GoTo(Stage::Generating),
        format!("generation of {total} images scheduled"),
    );
    if let Some(lead) = lead {
        result = result.reply(lead);
    }
    Ok(result.reply(texts::generation_started(total)).with_launch(launch))
}
