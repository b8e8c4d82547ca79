//! User-facing wording and keyboards.

use stage_flow::{Choice, Reply};

use crate::models::{Marketplace, VariationMode};

pub const DEFAULT_STYLE: &str = "светлый минималистичный";

pub const GENERIC_ERROR: &str = "❌ Произошла ошибка. Попробуйте ещё раз или отправьте /start";
pub const RESET_DONE: &str = "🗑 История сброшена. Пришлите фото товара.";
pub const ASK_PHOTO: &str = "📷 Пожалуйста, пришлите *фото товара* (не файл, а картинку).";
pub const ANALYZING: &str = "🔍 Анализирую товар, определяю УТП...";
pub const ANALYSIS_FAILED: &str = "❌ Не смог проанализировать фото. Попробуйте другое изображение.";
pub const ASK_UTP_EDIT: &str = "✏️ Введите УТП (2–3 слова, без кавычек):";
pub const UTP_WORDS_REJECTED: &str = "⚠️ Нужно ровно 2–3 слова. Попробуйте ещё раз:";
pub const ASK_STYLE: &str =
    "🎨 В каком цветовом стиле делать фон?\n_(например: пастельные тона, тёмный минимализм, яркий неон)_";
pub const ASK_STYLE_AGAIN: &str = "🎨 Напишите стиль фона (любым текстом):";
pub const ASK_VARIATION: &str = "Выберите режим:";
pub const BUSY: &str = "⏳ Генерация уже идёт, пожалуйста подождите...";
pub const STALE_GENERATION: &str =
    "⚠️ Предыдущая генерация была прервана. Пришлите фото товара, чтобы начать заново.";
pub const DONE: &str = "✅ Готово! Пришлите новое фото для следующего товара 📷";

/// Presets offered under the style prompt: callback key and the style they stand for
pub const STYLE_PRESETS: [(&str, &str); 4] = [
    ("pastel", "пастельные тона"),
    ("dark", "тёмный минимализм"),
    ("neon", "яркий неон"),
    ("light", DEFAULT_STYLE),
];

pub fn welcome() -> Reply {
    let mut text = String::from(
        "👋 Привет! Я генерирую инфографику для маркетплейсов.\n\n📷 Пришлите фото товара — и я создам карточку для:\n",
    );
    for mp in Marketplace::ALL {
        let canvas = mp.canvas();
        text.push_str(&format!("  • {} ({}×{})\n", mp.label(), canvas.width, canvas.height));
    }
    text.push_str("\nНачнём? Пришлите фото товара 👇");
    Reply::plain(text)
}

pub fn utp_approval(utp: &str) -> Reply {
    Reply::markdown(format!("💡 УТП: *{utp}*\n\nСогласовать?")).with_choices(vec![vec![
        Choice::new("✅ Согласовать", "utp:ok"),
        Choice::new("✏️ Изменить", "utp:edit"),
    ]])
}

pub fn utp_saved(utp: &str) -> Reply {
    Reply::markdown(format!("✅ УТП сохранено: *{utp}*"))
}

pub fn marketplace_menu() -> Reply {
    let marks = ["🟣", "🔵", "🟡"];
    let mut rows: Vec<Vec<Choice>> = Marketplace::ALL
        .into_iter()
        .zip(marks)
        .map(|(mp, mark)| {
            let canvas = mp.canvas();
            vec![Choice::new(
                format!("{mark} {} ({}×{})", mp.label(), canvas.width, canvas.height),
                format!("mp:{}", mp.key()),
            )]
        })
        .collect();
    rows.push(vec![Choice::new("🌐 Все три сразу", "mp:all")]);
    Reply::plain("🛒 Выберите маркетплейс:").with_choices(rows)
}

pub fn targets_label(targets: &[Marketplace]) -> String {
    match targets {
        [single] => single.label().to_string(),
        _ => "Все три".to_string(),
    }
}

pub fn ask_quantity(targets: &[Marketplace], max: u32) -> Reply {
    Reply::markdown(format!(
        "✅ Выбрано: *{}*\n\n🔢 Сколько картинок сгенерировать?\nНапишите цифрой (1–{max}):",
        targets_label(targets)
    ))
}

pub fn quantity_rejected(max: u32) -> Reply {
    Reply::plain(format!("⚠️ Введите целое число от 1 до {max}:"))
}

/// Confirmation of the accepted quantity, with the per-target total when several targets are chosen
pub fn quantity_accepted(quantity: u32, targets: usize) -> String {
    if targets > 1 {
        let total = quantity * targets as u32;
        format!(
            "✅ Количество: *{quantity}* (итого {total} картинок — по {quantity} на каждый маркетплейс)"
        )
    } else {
        format!("✅ Количество: *{quantity}*")
    }
}

pub fn variation_choices() -> Vec<Vec<Choice>> {
    vec![vec![
        Choice::new("🔁 Одинаковая серия", callback_for(VariationMode::Uniform)),
        Choice::new("🎲 Каждое разное", callback_for(VariationMode::Varied)),
    ]]
}

fn callback_for(mode: VariationMode) -> &'static str {
    match mode {
        VariationMode::Uniform => "mode:uniform",
        VariationMode::Varied => "mode:varied",
    }
}

pub fn ask_variation(quantity_line: &str) -> Reply {
    Reply::markdown(format!(
        "{quantity_line}\n\nГенерировать в одном стиле или каждое разное?"
    ))
    .with_choices(variation_choices())
}

pub fn style_choices() -> Vec<Vec<Choice>> {
    STYLE_PRESETS
        .iter()
        .map(|&(key, label)| vec![Choice::new(label, format!("style:{key}"))])
        .collect()
}

pub fn ask_style(lead: Option<&str>) -> Reply {
    let text = match lead {
        Some(lead) => format!("{lead}\n\n{ASK_STYLE}"),
        None => ASK_STYLE.to_string(),
    };
    Reply::markdown(text).with_choices(style_choices())
}

pub fn generation_started(total: u32) -> Reply {
    let noun = if total < 5 { "картинки" } else { "картинок" };
    Reply::markdown(format!(
        "⚙️ Начинаю генерацию *{total}* {noun}...\n\nЭто займёт ~{}–{} секунд. Ожидайте 🕐",
        total * 30,
        total * 50
    ))
}

pub fn generation_failed(reason: &str) -> Reply {
    let excerpt: String = reason.chars().take(200).collect();
    Reply::plain(format!(
        "❌ Ошибка при генерации: {excerpt}\n\nПопробуйте снова — пришлите фото."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_scales_with_total() {
        let reply = generation_started(6);
        assert!(reply.text.contains("*6* картинок"));
        assert!(reply.text.contains("~180–300 секунд"));
        assert!(generation_started(2).text.contains("картинки"));
    }

    #[test]
    fn test_failure_excerpt_is_bounded() {
        let reason = "ж".repeat(500);
        let reply = generation_failed(&reason);
        assert!(reply.text.contains("Ошибка"));
        assert_eq!(reply.text.matches('ж').count(), 200);
    }

    #[test]
    fn test_marketplace_menu_offers_every_target_and_all() {
        let reply = marketplace_menu();
        let tokens: Vec<&str> = reply
            .choices
            .iter()
            .flatten()
            .map(|c| c.token.as_str())
            .collect();
        assert_eq!(tokens, vec!["mp:wb", "mp:ozon", "mp:ym", "mp:all"]);
    }
}
