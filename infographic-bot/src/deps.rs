use stage_flow::{JobTracker, SessionStorage};
use std::{sync::Arc, time::Duration};

use crate::{
    capabilities::{ContentModel, ImageModel, MediaSource},
    config::FlowVariant,
    models::{ConversationState, Recipient},
    notify::{Notifier, Outbox},
};

/// Long-lived clients shared by every conversation, built once at start-up
#[derive(Clone)]
pub struct Deps {
    pub notifier: Arc<dyn Notifier>,
    pub media: Arc<dyn MediaSource>,
    pub content: Arc<dyn ContentModel>,
    pub images: Arc<dyn ImageModel>,
    pub storage: Arc<dyn SessionStorage<ConversationState>>,
    pub jobs: JobTracker,
    pub variant: FlowVariant,
    pub capability_timeout: Duration,
}

impl Deps {
    pub fn outbox(&self, to: Recipient) -> Outbox {
        Outbox::new(self.notifier.clone(), to)
    }
}
