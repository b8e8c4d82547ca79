use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{ContentModel, ImageModel, ImageSize};
use crate::{
    models::{InfographicContent, ProductAnalysis},
    pipeline::prompt,
};

const CHAT_MODEL: &str = "gpt-4o";
const IMAGE_MODEL: &str = "gpt-image-1";

/// Chat completions (vision + JSON) and image edits against an OpenAI-compatible API
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn chat(&self, content: Vec<Value>, max_tokens: u32, json_mode: bool) -> anyhow::Result<String> {
        let mut payload = json!({
            "model": CHAT_MODEL,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": max_tokens
        });
        if json_mode {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API request failed: {status}: {}", excerpt(&body)));
        }

        let response_json: Value = response.json().await?;
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid response format from LLM"))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ContentModel for OpenAiClient {
    async fn analyze_product(&self, photo: &[u8]) -> anyhow::Result<ProductAnalysis> {
        let content = vec![
            json!({
                "type": "image_url",
                "image_url": { "url": data_url(photo) }
            }),
            json!({
                "type": "text",
                "text": prompt::ANALYZE_PRODUCT
            }),
        ];

        let raw = self.chat(content, 120, false).await?;
        debug!(raw = %raw, "product analysis response");
        let analysis = ProductAnalysis::parse(&raw)?;
        info!(utp = %analysis.utp, "product analysed");
        Ok(analysis)
    }

    async fn compose_content(&self, utp: &str, style: &str) -> anyhow::Result<InfographicContent> {
        let content = vec![json!({
            "type": "text",
            "text": prompt::content_request(utp, style)
        })];

        let raw = self.chat(content, 400, true).await?;
        InfographicContent::parse(&raw, utp)
    }
}

#[async_trait]
impl ImageModel for OpenAiClient {
    async fn edit_image(
        &self,
        image: &[u8],
        instructions: &str,
        size: ImageSize,
    ) -> anyhow::Result<Vec<u8>> {
        let (mime, extension) = image_kind(image);
        let part = Part::bytes(image.to_vec())
            .file_name(format!("input.{extension}"))
            .mime_str(mime)?;

        let form = Form::new()
            .text("model", IMAGE_MODEL)
            .text("prompt", instructions.to_string())
            .text("n", "1")
            .text("size", size.to_string())
            .part("image", part);

        let response = self
            .http
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("image edit failed: {status}: {}", excerpt(&body)));
        }

        let response_json: Value = response.json().await?;
        let encoded = response_json["data"][0]["b64_json"]
            .as_str()
            .ok_or_else(|| anyhow!("image edit response carried no b64_json"))?;

        Ok(STANDARD.decode(encoded)?)
    }
}

fn image_kind(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => ("image/png", "png"),
        Ok(image::ImageFormat::WebP) => ("image/webp", "webp"),
        _ => ("image/jpeg", "jpg"),
    }
}

fn data_url(bytes: &[u8]) -> String {
    let (mime, _) = image_kind(bytes);
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn excerpt(body: &str) -> String {
    body.chars().take(300).collect()
}
