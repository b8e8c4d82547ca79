use std::{str::FromStr, time::Duration};
use thiserror::Error;

use stage_flow::DEFAULT_SESSION_TTL;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which dialogue the bot runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowVariant {
    /// Up to 10 images per target; asks for variation mode and background style
    #[default]
    Classic,
    /// Up to 5 images per target; always varied, style comes from the photo analysis
    Express,
}

impl FlowVariant {
    pub fn max_quantity(self) -> u32 {
        match self {
            FlowVariant::Classic => 10,
            FlowVariant::Express => 5,
        }
    }

    pub fn asks_variation(self) -> bool {
        matches!(self, FlowVariant::Classic)
    }

    pub fn asks_style(self) -> bool {
        matches!(self, FlowVariant::Classic)
    }
}

impl FromStr for FlowVariant {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(FlowVariant::Classic),
            "express" => Ok(FlowVariant::Express),
            other => Err(format!("expected classic or express, got {other}")),
        }
    }
}

/// Backend used for image edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageProvider {
    #[default]
    OpenAi,
    Predictions,
}

impl FromStr for ImageProvider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ImageProvider::OpenAi),
            "predictions" => Ok(ImageProvider::Predictions),
            other => Err(format!("expected openai or predictions, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionsSettings {
    pub base_url: String,
    pub api_token: String,
    pub model: String,
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

/// Process configuration, read once at start-up
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub telegram_api_base: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
    pub port: u16,
    pub variant: FlowVariant,
    pub image_provider: ImageProvider,
    pub predictions: Option<PredictionsSettings>,
    pub capability_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let image_provider = parse_or(&get, "IMAGE_PROVIDER", ImageProvider::default())?;
        let predictions = match image_provider {
            ImageProvider::OpenAi => None,
            ImageProvider::Predictions => Some(PredictionsSettings {
                base_url: get("PREDICTIONS_BASE_URL")
                    .ok_or(ConfigError::Missing("PREDICTIONS_BASE_URL"))?,
                api_token: get("PREDICTIONS_API_TOKEN")
                    .ok_or(ConfigError::Missing("PREDICTIONS_API_TOKEN"))?,
                model: get("PREDICTIONS_MODEL").ok_or(ConfigError::Missing("PREDICTIONS_MODEL"))?,
                poll_interval: Duration::from_millis(parse_or(&get, "POLL_INTERVAL_MS", 2000u64)?),
                max_attempts: parse_or(&get, "POLL_MAX_ATTEMPTS", 60u32)?,
            }),
        };

        Ok(Self {
            bot_token,
            telegram_api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            redis_url: get("REDIS_URL"),
            session_ttl: Duration::from_secs(parse_or(
                &get,
                "SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL.as_secs(),
            )?),
            port: parse_or(&get, "PORT", 8000u16)?,
            variant: parse_or(&get, "FLOW_VARIANT", FlowVariant::default())?,
            image_provider,
            predictions,
            capability_timeout: Duration::from_secs(parse_or(&get, "CAPABILITY_TIMEOUT_SECS", 180u64)?),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("BOT_TOKEN", "t"), ("OPENAI_API_KEY", "k")]).unwrap();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.session_ttl, Duration::from_secs(3600));
        assert_eq!(settings.variant, FlowVariant::Classic);
        assert_eq!(settings.image_provider, ImageProvider::OpenAi);
        assert!(settings.redis_url.is_none());
        assert!(settings.predictions.is_none());
    }

    #[test]
    fn test_required_keys() {
        assert_eq!(
            settings(&[("OPENAI_API_KEY", "k")]).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
        assert_eq!(
            settings(&[("BOT_TOKEN", "t"), ("OPENAI_API_KEY", "  ")]).unwrap_err(),
            ConfigError::Missing("OPENAI_API_KEY")
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = settings(&[("BOT_TOKEN", "t"), ("OPENAI_API_KEY", "k"), ("PORT", "http")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = settings(&[
            ("BOT_TOKEN", "t"),
            ("OPENAI_API_KEY", "k"),
            ("FLOW_VARIANT", "turbo"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FLOW_VARIANT", .. }));
    }

    #[test]
    fn test_predictions_provider_needs_its_endpoint() {
        let err = settings(&[
            ("BOT_TOKEN", "t"),
            ("OPENAI_API_KEY", "k"),
            ("IMAGE_PROVIDER", "predictions"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("PREDICTIONS_BASE_URL"));

        let settings = settings(&[
            ("BOT_TOKEN", "t"),
            ("OPENAI_API_KEY", "k"),
            ("IMAGE_PROVIDER", "Predictions"),
            ("PREDICTIONS_BASE_URL", "https://jobs.example"),
            ("PREDICTIONS_API_TOKEN", "secret"),
            ("PREDICTIONS_MODEL", "bg-editor"),
            ("POLL_MAX_ATTEMPTS", "5"),
            ("FLOW_VARIANT", "express"),
        ])
        .unwrap();
        let predictions = settings.predictions.unwrap();
        assert_eq!(predictions.max_attempts, 5);
        assert_eq!(predictions.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.variant.max_quantity(), 5);
        assert!(!settings.variant.asks_style());
    }
}
