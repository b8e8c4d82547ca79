//! Image edits through a prediction-style job API: submit, poll until done, download.

use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ImageModel, ImageSize};
use crate::config::PredictionsSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobState {
    Pending,
    Succeeded(String),
    Failed(String),
}

fn interpret_status(body: &Value) -> JobState {
    match body["status"].as_str().unwrap_or_default() {
        "succeeded" => {
            let output = match &body["output"] {
                Value::String(url) => Some(url.clone()),
                Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
                _ => None,
            };
            match output {
                Some(url) => JobState::Succeeded(url),
                None => JobState::Failed("job succeeded without an output".to_string()),
            }
        }
        "failed" | "canceled" | "cancelled" => JobState::Failed(
            body["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("job ended as {}", body["status"])),
        ),
        _ => JobState::Pending,
    }
}

#[derive(Clone)]
pub struct PollingImageModel {
    http: Client,
    settings: PredictionsSettings,
}

impl PollingImageModel {
    pub fn new(http: Client, settings: PredictionsSettings) -> Self {
        Self { http, settings }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str) -> anyhow::Result<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.settings.api_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("prediction status request failed: {}", response.status()));
        }
        Ok(response.json().await?)
    }

    async fn wait_for(&self, id: &str) -> anyhow::Result<String> {
        let url = self.endpoint(&format!("predictions/{id}"));
        for attempt in 1..=self.settings.max_attempts {
            tokio::time::sleep(self.settings.poll_interval).await;
            let body = self.get_json(&url).await?;
            match interpret_status(&body) {
                JobState::Pending => debug!(prediction_id = %id, attempt, "prediction pending"),
                JobState::Succeeded(output) => return Ok(output),
                JobState::Failed(reason) => return Err(anyhow!("prediction failed: {reason}")),
            }
        }
        warn!(prediction_id = %id, attempts = self.settings.max_attempts, "gave up polling");
        Err(anyhow!(
            "prediction timed out after {} polls",
            self.settings.max_attempts
        ))
    }

    pub fn max_wait(&self) -> Duration {
        self.settings.poll_interval * self.settings.max_attempts
    }
}

#[async_trait]
impl ImageModel for PollingImageModel {
    async fn edit_image(
        &self,
        image: &[u8],
        instructions: &str,
        size: ImageSize,
    ) -> anyhow::Result<Vec<u8>> {
        let (width, height) = size.dimensions();
        let payload = json!({
            "model": self.settings.model,
            "input": {
                "image": format!("data:application/octet-stream;base64,{}", STANDARD.encode(image)),
                "prompt": instructions,
                "width": width,
                "height": height,
            }
        });

        let response = self
            .http
            .post(self.endpoint("predictions"))
            .bearer_auth(&self.settings.api_token)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("prediction submit failed: {}", response.status()));
        }
        let submitted: Value = response.json().await?;

        // Some providers answer synchronously when the job is quick
        let output = match interpret_status(&submitted) {
            JobState::Succeeded(output) => output,
            JobState::Failed(reason) => return Err(anyhow!("prediction failed: {reason}")),
            JobState::Pending => {
                let id = submitted["id"]
                    .as_str()
                    .ok_or_else(|| anyhow!("prediction submit returned no id"))?;
                self.wait_for(id).await?
            }
        };

        let response = self.http.get(&output).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("prediction output download failed: {}", response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
