//! External AI and media services, behind traits so the flow can run against fakes.

pub mod openai;
pub mod polling;
pub mod raster;

use async_trait::async_trait;
use std::{fmt, future::Future, time::Duration};

use crate::models::{Canvas, InfographicContent, ProductAnalysis};

pub use openai::OpenAiClient;
pub use polling::PollingImageModel;

/// Resolves an opaque media reference to the file bytes
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, bot_token: &str, media_ref: &str) -> anyhow::Result<Vec<u8>>;
}

/// Text-producing vision/language model
#[async_trait]
pub trait ContentModel: Send + Sync {
    /// Derive the selling point (and optionally a style) from a product photo
    async fn analyze_product(&self, photo: &[u8]) -> anyhow::Result<ProductAnalysis>;

    /// Produce the copy and layout hints for a card
    async fn compose_content(&self, utp: &str, style: &str) -> anyhow::Result<InfographicContent>;
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn edit_image(
        &self,
        image: &[u8],
        instructions: &str,
        size: ImageSize,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Output sizes image providers accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Square,
    Portrait,
    Landscape,
}

impl ImageSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ImageSize::Square => (1024, 1024),
            ImageSize::Portrait => (1024, 1536),
            ImageSize::Landscape => (1536, 1024),
        }
    }

    /// Supported size whose aspect ratio is closest to the canvas
    pub fn closest_to(canvas: Canvas) -> Self {
        let target = canvas.width as f64 / canvas.height.max(1) as f64;
        [ImageSize::Square, ImageSize::Portrait, ImageSize::Landscape]
            .into_iter()
            .min_by(|a, b| {
                let da = (a.aspect() - target).abs();
                let db = (b.aspect() - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(ImageSize::Square)
    }

    fn aspect(self) -> f64 {
        let (w, h) = self.dimensions();
        w as f64 / h as f64
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{w}x{h}")
    }
}

/// Bound a capability call; elapsed time becomes an ordinary failure
pub async fn bounded<T, F>(what: &str, limit: Duration, call: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("{what} timed out after {}s", limit.as_secs())),
    }
}
