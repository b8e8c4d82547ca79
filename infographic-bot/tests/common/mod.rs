#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use infographic_bot::{
    ChatId, ConversationState, Deps, Dispatcher, FlowVariant, InboundEvent,
    capabilities::{ContentModel, ImageModel, ImageSize, MediaSource},
    models::{InfographicContent, ProductAnalysis, Recipient},
    notify::{MediaItem, Notifier},
};
use stage_flow::{InMemorySessionStorage, JobTracker, Reply, Session, SessionStorage};
use std::{
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::Semaphore, task::JoinHandle};

pub const BOT_TOKEN: &str = "123:test";

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(Reply),
    Photo(Option<String>),
    Album(Vec<Option<String>>),
    Ack(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(reply) => Some(reply.text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<Reply> {
        self.sent().into_iter().rev().find_map(|sent| match sent {
            Sent::Text(reply) => Some(reply),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, _to: &Recipient, reply: &Reply) -> anyhow::Result<()> {
        self.push(Sent::Text(reply.clone()));
        Ok(())
    }

    async fn send_photo(
        &self,
        _to: &Recipient,
        _bytes: Vec<u8>,
        caption: Option<String>,
    ) -> anyhow::Result<()> {
        self.push(Sent::Photo(caption));
        Ok(())
    }

    async fn send_media_group(&self, _to: &Recipient, items: Vec<MediaItem>) -> anyhow::Result<()> {
        self.push(Sent::Album(items.into_iter().map(|item| item.caption).collect()));
        Ok(())
    }

    async fn answer_callback(&self, _bot_token: &str, callback_id: &str) -> anyhow::Result<()> {
        self.push(Sent::Ack(callback_id.to_string()));
        Ok(())
    }
}

/// Photo store; can be told to fail, or to wait for a permit before answering
pub struct FakeMedia {
    pub fail: bool,
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn fetch(&self, _bot_token: &str, media_ref: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.fail {
            anyhow::bail!("media unavailable: {media_ref}");
        }
        Ok(png(16, 16))
    }
}

pub struct FakeContent {
    pub fail_analysis: bool,
}

#[async_trait]
impl ContentModel for FakeContent {
    async fn analyze_product(&self, _photo: &[u8]) -> anyhow::Result<ProductAnalysis> {
        if self.fail_analysis {
            anyhow::bail!("vision model unavailable");
        }
        Ok(ProductAnalysis {
            utp: "лёгкое и удобное".to_string(),
            suggested_style: Some("пастельные тона".to_string()),
            category: None,
        })
    }

    async fn compose_content(&self, utp: &str, _style: &str) -> anyhow::Result<InfographicContent> {
        Ok(InfographicContent {
            utp: utp.to_string(),
            bullets: vec!["тихий мотор".to_string(), "быстрая зарядка".to_string()],
            ..InfographicContent::default()
        })
    }
}

/// Records every instruction and answers with a small valid PNG, or panics when told to
#[derive(Default)]
pub struct FakeImages {
    pub panics: bool,
    calls: Mutex<Vec<(String, ImageSize)>>,
}

impl FakeImages {
    pub fn calls(&self) -> Vec<(String, ImageSize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageModel for FakeImages {
    async fn edit_image(
        &self,
        _image: &[u8],
        instructions: &str,
        size: ImageSize,
    ) -> anyhow::Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((instructions.to_string(), size));
        if self.panics {
            panic!("renderer crashed");
        }
        Ok(png(24, 32))
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    DynamicImage::new_rgba8(width, height)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub struct HarnessOptions {
    pub variant: FlowVariant,
    pub media_fails: bool,
    pub analysis_fails: bool,
    pub images_panic: bool,
    pub gate: Option<Arc<Semaphore>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            variant: FlowVariant::Classic,
            media_fails: false,
            analysis_fails: false,
            images_panic: false,
            gate: None,
        }
    }
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub storage: Arc<InMemorySessionStorage<ConversationState>>,
    pub notifier: Arc<RecordingNotifier>,
    pub images: Arc<FakeImages>,
    pub jobs: JobTracker,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(options: HarnessOptions) -> Self {
        let storage = Arc::new(InMemorySessionStorage::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let images = Arc::new(FakeImages {
            panics: options.images_panic,
            ..FakeImages::default()
        });
        let jobs = JobTracker::new();

        let deps = Deps {
            notifier: notifier.clone(),
            media: Arc::new(FakeMedia {
                fail: options.media_fails,
                gate: options.gate,
            }),
            content: Arc::new(FakeContent {
                fail_analysis: options.analysis_fails,
            }),
            images: images.clone(),
            storage: storage.clone(),
            jobs: jobs.clone(),
            variant: options.variant,
            capability_timeout: Duration::from_secs(30),
        };

        Self {
            dispatcher: Dispatcher::new(deps),
            storage,
            notifier,
            images,
            jobs,
        }
    }

    pub async fn send(&self, event: InboundEvent) -> Option<JoinHandle<()>> {
        self.dispatcher.handle(event, BOT_TOKEN).await
    }

    pub async fn text(&self, chat: i64, text: &str) -> Option<JoinHandle<()>> {
        self.send(InboundEvent {
            chat_id: Some(ChatId::Numeric(chat)),
            text: Some(text.to_string()),
            ..InboundEvent::default()
        })
        .await
    }

    pub async fn photo(&self, chat: i64, media_ref: &str) -> Option<JoinHandle<()>> {
        self.send(InboundEvent {
            chat_id: Some(ChatId::Numeric(chat)),
            media_ref: Some(media_ref.to_string()),
            ..InboundEvent::default()
        })
        .await
    }

    pub async fn callback(&self, chat: i64, data: &str) -> Option<JoinHandle<()>> {
        self.send(InboundEvent {
            chat_id: Some(ChatId::Numeric(chat)),
            is_callback: true,
            callback_id: Some(format!("cb-{data}")),
            callback_data: Some(data.to_string()),
            ..InboundEvent::default()
        })
        .await
    }

    /// Stored record, if any
    pub async fn stored(&self, chat: i64) -> Option<ConversationState> {
        self.storage
            .get(&chat.to_string())
            .await
            .unwrap()
            .map(|session| session.state)
    }

    pub async fn seed(&self, chat: i64, state: ConversationState) {
        self.storage
            .save(&Session::with_state(chat.to_string(), state))
            .await
            .unwrap();
    }
}
