use infographic_bot::{Settings, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing; JSON by default, `LOG_FORMAT=pretty` for development
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "infographic_bot=debug,stage_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::from_env()?;
    info!(variant = ?settings.variant, provider = ?settings.image_provider, "configuration loaded");

    let app = create_app(&settings).await?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    let addr = listener.local_addr()?;

    info!("Infographic bot listening on {}", addr);
    info!("Webhook endpoint: POST http://{}/webhook", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
