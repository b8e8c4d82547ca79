//! Entry point for one inbound event: commands, callback acknowledgement, one stage step.

use stage_flow::{ExecutionStatus, FlowRunner};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::{
    deps::Deps,
    models::{ConversationState, InboundEvent, Turn},
    notify::Outbox,
    texts,
    workflow::create_flow_runner,
};

/// Commands honoured at every stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Overwrite the record with the default one and greet
    Start,
    /// Delete the record
    Reset,
}

impl Command {
    /// The whole message must be the command, optionally addressed as `/start@bot`
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim();
        let name = word.split_once('@').map_or(word, |(name, _bot)| name);
        match name {
            "/start" => Some(Command::Start),
            "/reset" | "/clear" => Some(Command::Reset),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    runner: FlowRunner<ConversationState, Turn>,
    deps: Deps,
}

impl Dispatcher {
    pub fn new(deps: Deps) -> Self {
        Self {
            runner: create_flow_runner(&deps),
            deps,
        }
    }

    /// Handle one event. Never fails; returns the generation job when this event started one.
    ///
    /// Events without a usable chat id (absent, `0` or empty) are dropped.
    pub async fn handle(&self, event: InboundEvent, bot_token: &str) -> Option<JoinHandle<()>> {
        let chat_id = event.chat_id.clone().filter(|id| !id.is_blank())?;
        let turn = Turn::new(chat_id, bot_token, event);
        let span = info_span!("dispatch", chat_id = %turn.chat_id);
        self.dispatch(turn).instrument(span).await
    }

    async fn dispatch(&self, turn: Turn) -> Option<JoinHandle<()>> {
        let session_id = turn.session_id();
        let outbox = self.deps.outbox(turn.recipient());

        info!(
            text = %turn.event.text(),
            callback = ?turn.event.callback_data(),
            photo = turn.event.media_ref().is_some(),
            "event received"
        );

        if let Some(command) = Command::parse(turn.event.text()) {
            self.run_command(command, &session_id, &outbox).await;
            return None;
        }

        if turn.event.is_callback {
            if let Some(callback_id) = turn.event.callback_id.as_deref() {
                outbox.ack(callback_id).await;
            }
        }

        match self.runner.run(&session_id, &turn).await {
            Ok(mut result) => {
                match result.status {
                    ExecutionStatus::Transitioned { from, to } => {
                        info!(from = %from, to = %to, "stage transition")
                    }
                    ExecutionStatus::Reset => info!("session reset"),
                    ExecutionStatus::WaitingForInput => {}
                }
                if let Some(status) = result.status_message.as_deref() {
                    info!(status = %status, "stage status");
                }

                for reply in result.replies.drain(..) {
                    outbox.send(&reply).await;
                }
                result.launch.take().map(|launch| launch.spawn())
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "failed to handle event");
                outbox.say(texts::GENERIC_ERROR).await;
                None
            }
        }
    }

    async fn run_command(&self, command: Command, session_id: &str, outbox: &Outbox) {
        info!(?command, "command received");
        match command {
            Command::Start => {
                self.runner.reset(session_id).await;
                outbox.send(&texts::welcome()).await;
            }
            Command::Reset => {
                self.runner.clear(session_id).await;
                outbox.say(texts::RESET_DONE).await;
            }
        }
    }
}
