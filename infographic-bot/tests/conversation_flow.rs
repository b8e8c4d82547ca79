mod common;

use common::{Harness, HarnessOptions, Sent};
use infographic_bot::{
    ConversationState, FlowVariant, InboundEvent, Stage,
    capabilities::ImageSize,
    models::{Marketplace, ProductAnalysis, VariationMode},
    pipeline::prompt,
    texts,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

fn analysed() -> ConversationState {
    ConversationState {
        stage: Stage::AwaitUtpApproval,
        photo_file_id: Some("photo1".to_string()),
        utp: Some("лёгкое и удобное".to_string()),
        analysis: Some(ProductAnalysis {
            utp: "лёгкое и удобное".to_string(),
            suggested_style: Some("пастельные тона".to_string()),
            category: None,
        }),
        ..ConversationState::default()
    }
}

fn ready_for_style() -> ConversationState {
    ConversationState {
        stage: Stage::AwaitStyle,
        targets: vec![Marketplace::Wildberries],
        quantity: Some(1),
        variation: Some(VariationMode::Uniform),
        ..analysed()
    }
}

#[tokio::test]
async fn test_full_dialogue_delivers_three_albums() {
    let harness = Harness::new();

    assert!(harness.photo(42, "photo1").await.is_none());
    let state = harness.stored(42).await.unwrap();
    assert_eq!(state.stage, Stage::AwaitUtpApproval);
    assert_eq!(state.photo_file_id.as_deref(), Some("photo1"));
    assert_eq!(harness.notifier.texts()[0], texts::ANALYZING);
    let approval = harness.notifier.last_text().unwrap();
    assert!(approval.text.contains("лёгкое и удобное"));
    assert_eq!(approval.choices[0].len(), 2);

    harness.callback(42, "utp:ok").await;
    assert_eq!(harness.stored(42).await.unwrap().stage, Stage::AwaitMarketplace);

    harness.callback(42, "mp:all").await;
    let state = harness.stored(42).await.unwrap();
    assert_eq!(state.stage, Stage::AwaitQuantity);
    assert_eq!(state.targets, Marketplace::ALL.to_vec());

    harness.text(42, "2").await;
    let state = harness.stored(42).await.unwrap();
    assert_eq!(state.stage, Stage::AwaitVariation);
    assert_eq!(state.quantity, Some(2));

    harness.callback(42, "mode:varied").await;
    assert_eq!(harness.stored(42).await.unwrap().stage, Stage::AwaitStyle);

    harness.notifier.clear();
    let job = harness
        .text(42, "пастельные тона")
        .await
        .expect("style should launch generation");
    assert_eq!(harness.stored(42).await.unwrap().stage, Stage::Generating);
    assert!(harness.notifier.texts()[0].contains("*6* картинок"));

    job.await.unwrap();

    assert_eq!(harness.stored(42).await.unwrap(), ConversationState::default());
    assert!(!harness.jobs.is_running("42"));

    let albums: Vec<Vec<Option<String>>> = harness
        .notifier
        .sent()
        .into_iter()
        .filter_map(|sent| match sent {
            Sent::Album(captions) => Some(captions),
            _ => None,
        })
        .collect();
    assert_eq!(albums.len(), 3);
    for (captions, target) in albums.iter().zip(Marketplace::ALL) {
        assert_eq!(
            captions,
            &vec![Some(format!("📦 {} #1", target.label())), None]
        );
    }
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::DONE);

    let calls = harness.images.calls();
    assert_eq!(calls.len(), 7);
    assert_eq!(
        calls
            .iter()
            .filter(|(instructions, _)| instructions == prompt::BACKGROUND_REMOVAL)
            .count(),
        1
    );
    assert_eq!(calls[0].1, ImageSize::Square);
    assert!(calls[1].0.contains("Wildberries"));
    assert_eq!(calls[1].1, ImageSize::Portrait);
    // Second image of each target carries a variation directive
    let directive = prompt::variation_directive(VariationMode::Varied, 1).unwrap();
    assert!(!calls[1].0.contains(directive));
    assert!(calls[2].0.ends_with(directive));
    assert!(calls[6].0.contains("Яндекс.Маркет"));
}

#[tokio::test]
async fn test_invalid_quantities_keep_the_session() {
    let harness = Harness::new();
    let waiting = ConversationState {
        stage: Stage::AwaitQuantity,
        targets: vec![Marketplace::Ozon],
        ..analysed()
    };
    harness.seed(7, waiting.clone()).await;

    for input in ["0", "11", "abc", "-1"] {
        harness.text(7, input).await;
        assert_eq!(harness.stored(7).await.unwrap(), waiting, "{input}");
        assert_eq!(
            harness.notifier.last_text().unwrap().text,
            "⚠️ Введите целое число от 1 до 10:"
        );
    }

    harness.text(7, "1").await;
    let state = harness.stored(7).await.unwrap();
    assert_eq!(state.quantity, Some(1));
    assert_eq!(state.stage, Stage::AwaitStyle);
    assert!(harness.notifier.last_text().unwrap().text.contains("цветовом стиле"));
}

#[tokio::test]
async fn test_utp_edit_accepts_two_or_three_words() {
    let harness = Harness::new();
    harness.seed(5, analysed()).await;

    harness.callback(5, "utp:edit").await;
    assert!(harness.stored(5).await.unwrap().utp_editing);
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::ASK_UTP_EDIT);

    for rejected in ["прочный", "очень прочный стальной корпус"] {
        harness.text(5, rejected).await;
        let state = harness.stored(5).await.unwrap();
        assert_eq!(state.stage, Stage::AwaitUtpApproval);
        assert_eq!(state.utp.as_deref(), Some("лёгкое и удобное"));
        assert_eq!(
            harness.notifier.last_text().unwrap().text,
            texts::UTP_WORDS_REJECTED
        );
    }

    harness.text(5, "прочный корпус").await;
    let state = harness.stored(5).await.unwrap();
    assert_eq!(state.stage, Stage::AwaitMarketplace);
    assert_eq!(state.utp.as_deref(), Some("прочный корпус"));
    assert!(!state.utp_editing);
}

#[tokio::test]
async fn test_repeated_approval_has_no_second_effect() {
    let harness = Harness::new();
    harness.seed(8, analysed()).await;

    harness.callback(8, "utp:ok").await;
    harness.callback(8, "utp:ok").await;

    assert_eq!(harness.stored(8).await.unwrap().stage, Stage::AwaitMarketplace);
    let menus = harness
        .notifier
        .texts()
        .iter()
        .filter(|text| text.contains("Выберите маркетплейс"))
        .count();
    assert_eq!(menus, 1);
    // Both taps are still acknowledged
    let acks = harness
        .notifier
        .sent()
        .into_iter()
        .filter(|sent| matches!(sent, Sent::Ack(_)))
        .count();
    assert_eq!(acks, 2);
}

#[tokio::test]
async fn test_unknown_callback_is_acknowledged_and_reprompts() {
    let harness = Harness::new();
    harness
        .seed(
            9,
            ConversationState {
                stage: Stage::AwaitMarketplace,
                ..analysed()
            },
        )
        .await;

    harness.callback(9, "mp:amazon").await;

    let sent = harness.notifier.sent();
    assert_eq!(sent[0], Sent::Ack("cb-mp:amazon".to_string()));
    assert_eq!(harness.stored(9).await.unwrap().stage, Stage::AwaitMarketplace);
    assert!(harness.notifier.last_text().unwrap().text.contains("Выберите маркетплейс"));
}

#[tokio::test]
async fn test_reset_deletes_the_session() {
    let harness = Harness::new();
    harness.seed(3, ready_for_style()).await;

    harness.text(3, "/reset").await;
    assert!(harness.stored(3).await.is_none());
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::RESET_DONE);

    harness.text(3, "привет").await;
    assert!(harness.stored(3).await.is_none());
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::ASK_PHOTO);
}

#[tokio::test]
async fn test_start_resets_from_any_stage() {
    let harness = Harness::new();
    harness
        .seed(
            4,
            ConversationState {
                stage: Stage::Generating,
                ..ready_for_style()
            },
        )
        .await;

    harness.text(4, "/start@infographic_bot").await;

    assert_eq!(harness.stored(4).await.unwrap(), ConversationState::default());
    assert!(harness.notifier.last_text().unwrap().text.contains("Wildberries (900×1200)"));
}

#[tokio::test]
async fn test_unknown_stored_stage_routes_to_photo_stage() {
    let harness = Harness::new();
    harness.storage.put_raw("11", r#"{"stage": "await_payment", "utp": "x y"}"#);

    harness.text(11, "hello").await;

    assert_eq!(harness.notifier.last_text().unwrap().text, texts::ASK_PHOTO);
}

#[tokio::test]
async fn test_generating_without_a_job_heals_itself() {
    let harness = Harness::new();
    harness
        .seed(
            12,
            ConversationState {
                stage: Stage::Generating,
                ..ready_for_style()
            },
        )
        .await;

    harness.text(12, "ну что там?").await;

    assert_eq!(harness.stored(12).await.unwrap(), ConversationState::default());
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::STALE_GENERATION);
}

#[tokio::test]
async fn test_events_during_generation_get_busy_notice() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::with(HarnessOptions {
        gate: Some(gate.clone()),
        ..HarnessOptions::default()
    });
    harness.seed(13, ready_for_style()).await;

    let job = harness.text(13, "тёмный минимализм").await.unwrap();
    assert!(harness.jobs.is_running("13"));

    harness.callback(13, "style:neon").await;
    harness.text(13, "ещё").await;
    assert_eq!(harness.stored(13).await.unwrap().stage, Stage::Generating);
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::BUSY);

    gate.add_permits(1);
    job.await.unwrap();

    assert_eq!(harness.stored(13).await.unwrap(), ConversationState::default());
    let photos: Vec<Sent> = harness
        .notifier
        .sent()
        .into_iter()
        .filter(|sent| matches!(sent, Sent::Photo(_)))
        .collect();
    assert_eq!(photos, vec![Sent::Photo(Some("📦 Wildberries".to_string()))]);
}

#[tokio::test]
async fn test_fetch_failure_resets_and_reports() {
    let harness = Harness::with(HarnessOptions {
        media_fails: true,
        ..HarnessOptions::default()
    });
    harness.seed(14, ready_for_style()).await;

    let job = harness.callback(14, "style:dark").await.unwrap();
    job.await.unwrap();

    assert_eq!(harness.stored(14).await.unwrap(), ConversationState::default());
    let last = harness.notifier.last_text().unwrap().text;
    assert!(last.contains("Ошибка"));
    assert!(last.contains("media unavailable"));
    assert!(harness
        .notifier
        .sent()
        .iter()
        .all(|sent| !matches!(sent, Sent::Photo(_) | Sent::Album(_))));
    assert!(harness.images.calls().is_empty());
}

#[tokio::test]
async fn test_failed_analysis_stays_at_photo_stage() {
    let harness = Harness::with(HarnessOptions {
        analysis_fails: true,
        ..HarnessOptions::default()
    });

    harness.photo(15, "blurry").await;

    assert!(harness.stored(15).await.is_none());
    assert_eq!(harness.notifier.last_text().unwrap().text, texts::ANALYSIS_FAILED);
}

#[tokio::test]
async fn test_express_flow_skips_straight_to_generation() {
    let harness = Harness::with(HarnessOptions {
        variant: FlowVariant::Express,
        ..HarnessOptions::default()
    });
    harness
        .seed(
            16,
            ConversationState {
                stage: Stage::AwaitQuantity,
                targets: vec![Marketplace::Ozon],
                ..analysed()
            },
        )
        .await;

    harness.text(16, "6").await;
    assert_eq!(
        harness.notifier.last_text().unwrap().text,
        "⚠️ Введите целое число от 1 до 5:"
    );

    let job = harness.text(16, "3").await.unwrap();
    let state = harness.stored(16).await.unwrap();
    assert_eq!(state.stage, Stage::Generating);
    assert_eq!(state.variation, Some(VariationMode::Varied));
    assert_eq!(state.style.as_deref(), Some("пастельные тона"));

    job.await.unwrap();
    let albums: Vec<Sent> = harness
        .notifier
        .sent()
        .into_iter()
        .filter(|sent| matches!(sent, Sent::Album(_)))
        .collect();
    assert_eq!(
        albums,
        vec![Sent::Album(vec![Some("📦 Ozon #1".to_string()), None, None])]
    );
}

#[tokio::test]
async fn test_event_without_chat_is_ignored() {
    let harness = Harness::new();

    let job = harness
        .send(InboundEvent {
            text: Some("/start".to_string()),
            ..InboundEvent::default()
        })
        .await;

    assert!(job.is_none());
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_event_with_zero_chat_id_is_ignored() {
    let harness = Harness::new();

    assert!(harness.text(0, "/start").await.is_none());
    assert!(harness.photo(0, "photo1").await.is_none());

    assert!(harness.notifier.sent().is_empty());
    assert_eq!(harness.stored(0).await, None);
}

#[tokio::test]
async fn test_start_with_trailing_words_is_plain_text() {
    let harness = Harness::new();
    harness.seed(8, analysed()).await;

    harness.text(8, "/start now").await;

    assert_eq!(harness.stored(8).await.unwrap().stage, Stage::AwaitUtpApproval);
    assert_ne!(harness.notifier.last_text().unwrap(), texts::welcome());
}

#[tokio::test]
async fn test_crashed_renderer_resets_and_reports() {
    let harness = Harness::with(HarnessOptions {
        images_panic: true,
        ..HarnessOptions::default()
    });
    harness.seed(21, ready_for_style()).await;

    let job = harness
        .text(21, "тёмный фон")
        .await
        .expect("style should launch generation");
    job.await.unwrap();

    assert_eq!(harness.stored(21).await.unwrap(), ConversationState::default());
    assert!(!harness.jobs.is_running("21"));
    let last = harness.notifier.last_text().unwrap();
    assert!(last.text.contains("Ошибка"));
    assert!(last.text.contains("renderer crashed"));
    assert!(
        !harness
            .notifier
            .sent()
            .iter()
            .any(|sent| matches!(sent, Sent::Album(_) | Sent::Photo(_)))
    );
}
