use serde::{Deserialize, Serialize};
use stage_flow::FlowState;
use std::fmt;
use tracing::warn;

/// Bumped whenever `ConversationState` changes shape incompatibly
pub const SCHEMA_VERSION: u32 = 1;

/// Conversation identifier as sent by the chat transport: numeric or opaque
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Numeric(i64),
    Handle(String),
}

impl ChatId {
    /// `0` and empty handles do not name a conversation
    pub fn is_blank(&self) -> bool {
        match self {
            ChatId::Numeric(id) => *id == 0,
            ChatId::Handle(id) => id.trim().is_empty(),
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Numeric(id) => write!(f, "{id}"),
            ChatId::Handle(id) => f.write_str(id),
        }
    }
}

/// Raw event forwarded to the webhook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub chat_id: Option<ChatId>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_callback: bool,
    pub callback_id: Option<String>,
    pub callback_data: Option<String>,
    #[serde(rename = "photoFileId", alias = "mediaRef")]
    pub media_ref: Option<String>,
    /// Upstream asks us to acknowledge and ignore this event
    #[serde(default, deserialize_with = "null_as_false")]
    pub skip: bool,
}

/// Upstream relays send `null` for flags they did not set
fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl InboundEvent {
    pub fn text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback_data
            .as_deref()
            .map(str::trim)
            .filter(|data| !data.is_empty())
    }

    pub fn media_ref(&self) -> Option<&str> {
        self.media_ref
            .as_deref()
            .map(str::trim)
            .filter(|media| !media.is_empty())
    }
}

/// Where outbound messages for a conversation go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub bot_token: String,
    pub chat_id: ChatId,
}

/// One event on its way through the state machine
#[derive(Debug, Clone)]
pub struct Turn {
    pub chat_id: ChatId,
    pub bot_token: String,
    pub event: InboundEvent,
}

impl Turn {
    pub fn new(chat_id: ChatId, bot_token: impl Into<String>, event: InboundEvent) -> Self {
        Self {
            chat_id,
            bot_token: bot_token.into(),
            event,
        }
    }

    pub fn session_id(&self) -> String {
        self.chat_id.to_string()
    }

    pub fn recipient(&self) -> Recipient {
        Recipient {
            bot_token: self.bot_token.clone(),
            chat_id: self.chat_id.clone(),
        }
    }
}

/// Output canvas of a marketplace card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marketplace {
    #[serde(rename = "wb")]
    Wildberries,
    #[serde(rename = "ozon")]
    Ozon,
    #[serde(rename = "ym")]
    YandexMarket,
}

impl Marketplace {
    pub const ALL: [Marketplace; 3] = [
        Marketplace::Wildberries,
        Marketplace::Ozon,
        Marketplace::YandexMarket,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Marketplace::Wildberries => "wb",
            Marketplace::Ozon => "ozon",
            Marketplace::YandexMarket => "ym",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mp| mp.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            Marketplace::Wildberries => "Wildberries",
            Marketplace::Ozon => "Ozon",
            Marketplace::YandexMarket => "Яндекс.Маркет",
        }
    }

    pub fn canvas(self) -> Canvas {
        match self {
            Marketplace::Wildberries => Canvas {
                width: 900,
                height: 1200,
                margin: 60,
            },
            Marketplace::Ozon => Canvas {
                width: 1200,
                height: 1600,
                margin: 80,
            },
            Marketplace::YandexMarket => Canvas {
                width: 800,
                height: 800,
                margin: 50,
            },
        }
    }
}

/// Whether repeated outputs of one run look alike or are deliberately different
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationMode {
    #[default]
    #[serde(alias = "series")]
    Uniform,
    #[serde(alias = "different")]
    Varied,
}

/// Stages of the dialogue, in flow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Stage {
    #[default]
    AwaitPhoto,
    AwaitUtpApproval,
    AwaitMarketplace,
    AwaitQuantity,
    AwaitVariation,
    AwaitStyle,
    Generating,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::AwaitPhoto,
        Stage::AwaitUtpApproval,
        Stage::AwaitMarketplace,
        Stage::AwaitQuantity,
        Stage::AwaitVariation,
        Stage::AwaitStyle,
        Stage::Generating,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::AwaitPhoto => "await_photo",
            Stage::AwaitUtpApproval => "await_utp_approve",
            Stage::AwaitMarketplace => "await_marketplace",
            Stage::AwaitQuantity => "await_qty",
            Stage::AwaitVariation => "await_series",
            Stage::AwaitStyle => "await_style",
            Stage::Generating => "generating",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == raw)
    }
}

// Unknown stage names (older deployments, hand-edited records) map to the initial stage
impl From<String> for Stage {
    fn from(raw: String) -> Self {
        Stage::parse(&raw).unwrap_or_else(|| {
            warn!(stage = %raw, "unknown stage in stored session");
            Stage::AwaitPhoto
        })
    }
}

impl From<Stage> for &'static str {
    fn from(stage: Stage) -> Self {
        stage.as_str()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the vision model made of the product photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub utp: String,
    #[serde(default, alias = "style")]
    pub suggested_style: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ProductAnalysis {
    /// Accepts either the requested JSON object or a bare phrase
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        if let Some(object) = extract_json_object(raw) {
            if let Ok(mut parsed) = serde_json::from_str::<ProductAnalysis>(object) {
                parsed.utp = clean_phrase(&parsed.utp);
                parsed.suggested_style = parsed
                    .suggested_style
                    .map(|style| style.trim().to_string())
                    .filter(|style| !style.is_empty());
                if !parsed.utp.is_empty() {
                    return Ok(parsed);
                }
            }
        }

        let phrase = raw
            .lines()
            .map(clean_phrase)
            .find(|line| !line.is_empty() && !line.starts_with('{') && !line.starts_with("```"))
            .ok_or_else(|| anyhow::anyhow!("vision model returned no usable UTP"))?;

        Ok(Self {
            utp: phrase,
            suggested_style: None,
            category: None,
        })
    }
}

/// Structured copy for one infographic card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfographicContent {
    pub utp: String,
    pub bullets: Vec<String>,
    pub badge: String,
    pub text_zone: String,
    pub palette: Vec<String>,
    pub icon_style: String,
    pub background_notes: String,
}

impl Default for InfographicContent {
    fn default() -> Self {
        Self {
            utp: String::new(),
            bullets: Vec::new(),
            badge: "Новинка".to_string(),
            text_zone: "top-left".to_string(),
            palette: vec!["#ffffff".to_string(), "#000000".to_string()],
            icon_style: "flat minimal".to_string(),
            background_notes: "clean gradient".to_string(),
        }
    }
}

impl InfographicContent {
    /// Parse model output leniently: code fences and surrounding prose are ignored,
    /// missing fields take defaults, an empty headline falls back to `fallback_utp`.
    pub fn parse(raw: &str, fallback_utp: &str) -> anyhow::Result<Self> {
        let object = extract_json_object(raw)
            .ok_or_else(|| anyhow::anyhow!("content model returned no JSON object"))?;
        let mut content: InfographicContent = serde_json::from_str(object)
            .map_err(|e| anyhow::anyhow!("content model returned malformed JSON: {e}"))?;

        if content.utp.trim().is_empty() {
            content.utp = fallback_utp.to_string();
        }
        content.bullets.retain(|bullet| !bullet.trim().is_empty());
        if content.palette.is_empty() {
            content.palette = InfographicContent::default().palette;
        }
        Ok(content)
    }
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn clean_phrase(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '«' | '»' | '*' | '.' | '`') || c.is_whitespace())
        .to_string()
}

/// The persisted per-conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub version: u32,
    pub stage: Stage,
    pub photo_file_id: Option<String>,
    pub utp: Option<String>,
    pub utp_editing: bool,
    pub analysis: Option<ProductAnalysis>,
    #[serde(rename = "mp")]
    pub targets: Vec<Marketplace>,
    #[serde(rename = "qty")]
    pub quantity: Option<u32>,
    #[serde(rename = "series_mode")]
    pub variation: Option<VariationMode>,
    pub style: Option<String>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            stage: Stage::AwaitPhoto,
            photo_file_id: None,
            utp: None,
            utp_editing: false,
            analysis: None,
            targets: Vec::new(),
            quantity: None,
            variation: None,
            style: None,
        }
    }
}

impl ConversationState {
    fn has_prerequisites(&self) -> bool {
        let analysed = self.photo_file_id.is_some() && self.utp.is_some();
        match self.stage {
            Stage::AwaitPhoto | Stage::Generating => true,
            Stage::AwaitUtpApproval | Stage::AwaitMarketplace => analysed,
            Stage::AwaitQuantity => analysed && !self.targets.is_empty(),
            Stage::AwaitVariation | Stage::AwaitStyle => {
                analysed && !self.targets.is_empty() && self.quantity.is_some()
            }
        }
    }
}

impl FlowState for ConversationState {
    type Stage = Stage;

    fn stage(&self) -> Stage {
        self.stage
    }

    fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    fn sanitize(self) -> Self {
        if self.version > SCHEMA_VERSION {
            warn!(version = self.version, "session written by a newer schema, discarding");
            return Self::default();
        }
        if !self.has_prerequisites() {
            warn!(stage = %self.stage, "session is missing data for its stage, discarding");
            return Self::default();
        }
        self
    }
}
