use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use stage_flow::{Reply, TextFormat};
use tracing::debug;

use super::{MediaItem, Notifier};
use crate::{capabilities::MediaSource, models::Recipient};

/// Bot API client; one instance serves every bot token
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_base: String,
}

impl TelegramClient {
    pub fn new(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn method_url(&self, bot_token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, bot_token, method)
    }

    fn file_url(&self, bot_token: &str, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, bot_token, file_path)
    }
}

fn reply_markup(reply: &Reply) -> Option<Value> {
    if reply.choices.is_empty() {
        return None;
    }
    let rows: Vec<Vec<Value>> = reply
        .choices
        .iter()
        .map(|row| {
            row.iter()
                .map(|choice| json!({ "text": choice.label, "callback_data": choice.token }))
                .collect()
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

fn png_part(bytes: Vec<u8>, file_name: String) -> anyhow::Result<Part> {
    Ok(Part::bytes(bytes).file_name(file_name).mime_str("image/png")?)
}

async fn ensure_ok(method: &str, response: Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow!("{method}: unreadable response ({status}): {e}"))?;

    if !status.is_success() || body["ok"] != Value::Bool(true) {
        let description = body["description"].as_str().unwrap_or("no description");
        return Err(anyhow!("{method} failed with {status}: {description}"));
    }
    Ok(body)
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, to: &Recipient, reply: &Reply) -> anyhow::Result<()> {
        let mut payload = json!({ "chat_id": to.chat_id, "text": reply.text });
        if reply.format == TextFormat::Markdown {
            payload["parse_mode"] = json!("Markdown");
        }
        if let Some(markup) = reply_markup(reply) {
            payload["reply_markup"] = markup;
        }

        let response = self
            .http
            .post(self.method_url(&to.bot_token, "sendMessage"))
            .json(&payload)
            .send()
            .await?;
        ensure_ok("sendMessage", response).await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        to: &Recipient,
        bytes: Vec<u8>,
        caption: Option<String>,
    ) -> anyhow::Result<()> {
        let form = Form::new()
            .text("chat_id", to.chat_id.to_string())
            .text("caption", caption.unwrap_or_default())
            .part("photo", png_part(bytes, "infographic.png".to_string())?);

        let response = self
            .http
            .post(self.method_url(&to.bot_token, "sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        ensure_ok("sendPhoto", response).await?;
        Ok(())
    }

    async fn send_media_group(&self, to: &Recipient, items: Vec<MediaItem>) -> anyhow::Result<()> {
        let mut media = Vec::with_capacity(items.len());
        let mut form = Form::new().text("chat_id", to.chat_id.to_string());

        for (i, item) in items.into_iter().enumerate() {
            let name = format!("photo_{i}");
            media.push(json!({
                "type": "photo",
                "media": format!("attach://{name}"),
                "caption": item.caption.unwrap_or_default(),
            }));
            form = form.part(name.clone(), png_part(item.bytes, format!("{name}.png"))?);
        }
        form = form.text("media", serde_json::to_string(&media)?);

        let response = self
            .http
            .post(self.method_url(&to.bot_token, "sendMediaGroup"))
            .multipart(form)
            .send()
            .await?;
        ensure_ok("sendMediaGroup", response).await?;
        Ok(())
    }

    async fn answer_callback(&self, bot_token: &str, callback_id: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .post(self.method_url(bot_token, "answerCallbackQuery"))
            .json(&json!({ "callback_query_id": callback_id }))
            .send()
            .await?;
        ensure_ok("answerCallbackQuery", response).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaSource for TelegramClient {
    async fn fetch(&self, bot_token: &str, media_ref: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http
            .get(self.method_url(bot_token, "getFile"))
            .query(&[("file_id", media_ref)])
            .send()
            .await?;
        let body = ensure_ok("getFile", response).await?;
        let file_path = body["result"]["file_path"]
            .as_str()
            .ok_or_else(|| anyhow!("getFile returned no file_path for {media_ref}"))?;

        debug!(file_path = %file_path, "downloading media");
        let response = self.http.get(self.file_url(bot_token, file_path)).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("file download failed: {}", response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
