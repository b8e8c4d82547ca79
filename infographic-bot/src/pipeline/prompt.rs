use crate::models::{InfographicContent, Marketplace, VariationMode};

pub const ANALYZE_PRODUCT: &str = "Определи главное УТП (уникальное торговое предложение) этого товара. \
Ответь JSON-объектом {\"utp\": \"...\", \"style\": \"...\"}. \
utp: ТОЛЬКО 2–3 слова на русском языке, без кавычек, без точек, без эмодзи, без названия бренда/модели. \
Пример хорошего utp: лёгкое и удобное. \
style: короткое описание цветового стиля фона, который подойдёт товару (например: пастельные тона).";

pub const BACKGROUND_REMOVAL: &str = "Remove the background and return a clean transparent PNG with alpha channel. \
Keep product fully visible, centered, not cropped. \
Preserve original colors and all details. \
No shadows, no new background, no artifacts.";

const VARIATIONS: [&str; 3] = [
    "Use completely different background composition and shapes.",
    "Flip layout — move text zone to opposite side, change background geometry.",
    "Use diagonal layout, bold geometric background elements.",
];

pub fn content_request(utp: &str, style: &str) -> String {
    format!(
        r##"Ты дизайнер инфографики для маркетплейсов. Сгенерируй JSON для карточки товара.
УТП товара: "{utp}"
Стиль фона: "{style}"

Верни ТОЛЬКО валидный JSON без комментариев:
{{
  "utp": "финальное УТП 2-3 слова",
  "bullets": ["2-4 слова", "2-4 слова", "2-4 слова"],
  "badge": "Новинка",
  "text_zone": "top-left",
  "palette": ["#hex1", "#hex2", "#hex3"],
  "icon_style": "одна фраза про стиль иконок",
  "background_notes": "одна фраза про фон"
}}

Правила:
- bullets: 2-3 штуки, короткие (2-4 слова), без цифр-обещаний
- palette: 3-5 hex цветов, гармоничные, подходящие к стилю "{style}"
- badge всегда "Новинка"
- text_zone: top-left, top-right, bottom-left или bottom-right"##
    )
}

/// Extra compositional instruction for the `index`-th image of a varied run
pub fn variation_directive(mode: VariationMode, index: u32) -> Option<&'static str> {
    match mode {
        VariationMode::Varied if index > 0 => Some(VARIATIONS[index as usize % VARIATIONS.len()]),
        _ => None,
    }
}

pub fn card_prompt(
    content: &InfographicContent,
    target: Marketplace,
    style: &str,
    variation: Option<&str>,
) -> String {
    let canvas = target.canvas();
    let mut prompt = format!(
        "Create a professional marketplace infographic card for {name}.
Canvas size: {w}x{h}px. Safe margins: {margin}px on all sides.

Product cutout is provided as input image — keep it exactly as-is, centered on canvas.
DO NOT redraw, modify, distort or replace the product.

Layout:
- Text zone: {text_zone} corner
- Badge \"{badge}\" in contrasting corner
- 2-3 bullet points with small icons (generate icons that match: {icon_style})

Typography & text (all in Russian):
- Main headline: {utp}
- Bullets: {bullets}

Design:
- Color palette: {palette}
- Background style: {background}, {style}
- Clean commercial design, no watermarks, no English text
- All text strictly inside canvas, within safe margins
- Professional marketplace product card aesthetic",
        name = target.label(),
        w = canvas.width,
        h = canvas.height,
        margin = canvas.margin,
        text_zone = content.text_zone,
        badge = content.badge,
        icon_style = content.icon_style,
        utp = content.utp,
        bullets = content.bullets.join(" | "),
        palette = content.palette.join(", "),
        background = content.background_notes,
    );

    if let Some(variation) = variation {
        prompt.push('\n');
        prompt.push_str(variation);
    }
    prompt
}
