use anyhow::{Context, anyhow};
use image::{ImageFormat, imageops::FilterType};
use std::io::Cursor;

use crate::models::Canvas;

/// Fit generated art to the exact canvas (scale to cover, center crop) and re-encode as PNG
pub async fn normalize(bytes: Vec<u8>, canvas: Canvas) -> anyhow::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || normalize_blocking(&bytes, canvas))
        .await
        .map_err(|e| anyhow!("normalisation task failed: {e}"))?
}

fn normalize_blocking(bytes: &[u8], canvas: Canvas) -> anyhow::Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("generated image could not be decoded")?;

    let fitted = if decoded.width() == canvas.width && decoded.height() == canvas.height {
        decoded
    } else {
        decoded.resize_to_fill(canvas.width, canvas.height, FilterType::Lanczos3)
    };

    let mut buffer = Vec::new();
    fitted
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| anyhow!("Failed to encode image: {}", e))?;
    Ok(buffer)
}
