use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use reqwest::Client;
use serde_json::{Value, json};
use stage_flow::{InMemorySessionStorage, JobTracker, RedisSessionStorage, SessionStorage};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::{
    capabilities::{ImageModel, OpenAiClient, PollingImageModel},
    config::{ImageProvider, Settings},
    deps::Deps,
    dispatcher::Dispatcher,
    models::{ConversationState, InboundEvent},
    notify::TelegramClient,
};

pub const BOT_TOKEN_HEADER: &str = "x-bot-token";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub default_bot_token: String,
}

pub async fn create_app(settings: &Settings) -> anyhow::Result<Router> {
    let deps = create_deps(settings)?;
    let state = AppState {
        dispatcher: Arc::new(Dispatcher::new(deps)),
        default_bot_token: settings.bot_token.clone(),
    };
    Ok(build_router(state))
}

pub fn create_deps(settings: &Settings) -> anyhow::Result<Deps> {
    let http = Client::builder().build()?;

    let telegram = Arc::new(TelegramClient::new(http.clone(), &settings.telegram_api_base));
    let openai = Arc::new(OpenAiClient::new(
        http.clone(),
        &settings.openai_api_key,
        &settings.openai_base_url,
    ));

    let images: Arc<dyn ImageModel> = match (&settings.image_provider, &settings.predictions) {
        (ImageProvider::Predictions, Some(predictions)) => {
            let model = PollingImageModel::new(http.clone(), predictions.clone());
            if model.max_wait() > settings.capability_timeout {
                warn!(
                    max_wait_secs = model.max_wait().as_secs(),
                    timeout_secs = settings.capability_timeout.as_secs(),
                    "polling can outlast the capability timeout"
                );
            }
            info!("Using prediction-job image provider");
            Arc::new(model)
        }
        _ => {
            info!("Using OpenAI image edits");
            openai.clone()
        }
    };

    Ok(Deps {
        notifier: telegram.clone(),
        media: telegram,
        content: openai,
        images,
        storage: create_session_storage(settings),
        jobs: JobTracker::new(),
        variant: settings.variant,
        capability_timeout: settings.capability_timeout,
    })
}

fn create_session_storage(settings: &Settings) -> Arc<dyn SessionStorage<ConversationState>> {
    if let Some(redis_url) = &settings.redis_url {
        match RedisSessionStorage::with_options(redis_url, "session", settings.session_ttl) {
            Ok(storage) => {
                info!("Using Redis session storage");
                return Arc::new(storage);
            }
            Err(e) => {
                error!(
                    "Failed to configure Redis: {}. Falling back to in-memory storage.",
                    e
                );
            }
        }
    } else {
        info!("Using in-memory session storage (set REDIS_URL to use Redis)");
    }
    Arc::new(InMemorySessionStorage::with_ttl(settings.session_ttl))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(webhook))
        .layer(from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Acknowledge at once; the event is handled on its own task
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<InboundEvent>(&body) {
        Ok(event) if event.skip => debug!("skipping event marked skip"),
        Ok(event) => {
            let bot_token = headers
                .get(BOT_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|token| !token.is_empty())
                .unwrap_or(&state.default_bot_token)
                .to_string();
            let dispatcher = state.dispatcher.clone();
            tokio::spawn(
                async move {
                    let _ = dispatcher.handle(event, &bot_token).await;
                }
                .in_current_span(),
            );
        }
        Err(e) => warn!(error = %e, "webhook parse error"),
    }
    Json(json!({ "ok": true }))
}
