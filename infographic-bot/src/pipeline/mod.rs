//! Detached generation run: content → cutout → one card per target and index → delivery.
//!
//! A run works on a [`PipelineRun`] snapshot and only touches the stored session at its
//! two exits, both of which put the conversation back at the initial stage.

pub mod delivery;
pub mod prompt;

use anyhow::anyhow;
use stage_flow::Session;
use tracing::{error, info};

use crate::{
    capabilities::{ImageSize, bounded, raster},
    deps::Deps,
    models::{ConversationState, Marketplace, Recipient, VariationMode},
    texts,
};
use delivery::{Delivery, Rendered, plan_delivery};

/// Immutable copy of everything a generation run needs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub session_id: String,
    pub recipient: Recipient,
    pub photo_ref: String,
    pub utp: String,
    pub targets: Vec<Marketplace>,
    pub quantity: u32,
    pub variation: VariationMode,
    pub style: String,
}

impl PipelineRun {
    pub fn snapshot(
        session_id: &str,
        recipient: Recipient,
        state: &ConversationState,
    ) -> anyhow::Result<Self> {
        let photo_ref = state
            .photo_file_id
            .clone()
            .ok_or_else(|| anyhow!("no product photo in session"))?;
        let utp = state
            .utp
            .clone()
            .ok_or_else(|| anyhow!("no selling point in session"))?;
        if state.targets.is_empty() {
            return Err(anyhow!("no marketplace chosen"));
        }

        Ok(Self {
            session_id: session_id.to_string(),
            recipient,
            photo_ref,
            utp,
            targets: state.targets.clone(),
            quantity: state.quantity.unwrap_or(1).max(1),
            variation: state.variation.unwrap_or_default(),
            style: state
                .style
                .clone()
                .unwrap_or_else(|| texts::DEFAULT_STYLE.to_string()),
        })
    }

    pub fn total(&self) -> u32 {
        self.quantity * self.targets.len() as u32
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    deps: Deps,
}

impl Orchestrator {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// Run to completion. Every outcome ends with the session reset and the user told.
    pub async fn execute(&self, run: PipelineRun) {
        info!(chat_id = %run.recipient.chat_id, total = run.total(), "generation started");

        match self.produce(&run).await {
            Ok(outputs) => {
                let outbox = self.deps.outbox(run.recipient.clone());
                for delivery in plan_delivery(outputs) {
                    match delivery {
                        Delivery::Single { bytes, caption } => outbox.photo(bytes, Some(caption)).await,
                        Delivery::Album(items) => outbox.album(items).await,
                    }
                }
                self.reset(&run.session_id).await;
                outbox.say(texts::DONE).await;
                info!(chat_id = %run.recipient.chat_id, "generation finished");
            }
            Err(e) => self.fail(&run, &format!("{e:#}")).await,
        }
    }

    /// Failure exit, also used when the job itself dies
    pub async fn fail(&self, run: &PipelineRun, reason: &str) {
        error!(chat_id = %run.recipient.chat_id, error = %reason, "generation failed");
        self.reset(&run.session_id).await;
        self.deps
            .outbox(run.recipient.clone())
            .send(&texts::generation_failed(reason))
            .await;
    }

    async fn produce(&self, run: &PipelineRun) -> anyhow::Result<Vec<Rendered>> {
        let limit = self.deps.capability_timeout;
        let chat_id = &run.recipient.chat_id;

        info!(chat_id = %chat_id, "composing card content");
        let content = bounded(
            "content composition",
            limit,
            self.deps.content.compose_content(&run.utp, &run.style),
        )
        .await?;

        info!(chat_id = %chat_id, "fetching photo and removing background");
        let photo = bounded(
            "photo download",
            limit,
            self.deps.media.fetch(&run.recipient.bot_token, &run.photo_ref),
        )
        .await?;
        let cutout = bounded(
            "background removal",
            limit,
            self.deps
                .images
                .edit_image(&photo, prompt::BACKGROUND_REMOVAL, ImageSize::Square),
        )
        .await?;

        let mut outputs = Vec::with_capacity(run.total() as usize);
        for &target in &run.targets {
            let canvas = target.canvas();
            for index in 0..run.quantity {
                info!(
                    chat_id = %chat_id,
                    target = target.key(),
                    index = index + 1,
                    quantity = run.quantity,
                    "generating card"
                );
                let instructions = prompt::card_prompt(
                    &content,
                    target,
                    &run.style,
                    prompt::variation_directive(run.variation, index),
                );
                let art = bounded(
                    "card generation",
                    limit,
                    self.deps
                        .images
                        .edit_image(&cutout, &instructions, ImageSize::closest_to(canvas)),
                )
                .await?;
                let bytes = raster::normalize(art, canvas).await?;
                outputs.push(Rendered {
                    bytes,
                    target,
                    index,
                });
            }
        }
        Ok(outputs)
    }

    async fn reset(&self, session_id: &str) {
        let fresh = Session::<ConversationState>::new(session_id);
        if let Err(e) = self.deps.storage.save(&fresh).await {
            error!(session_id = %session_id, error = %e, "failed to reset session after generation");
        }
    }
}
