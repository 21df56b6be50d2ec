use speechgate_api::{build_router, state::AppState};
use speechgate_config::Settings;
use speechgate_speech::{BackendProfile, voice_bootstrap};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "speechgate_api=debug,speechgate_speech=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!(
        "Starting speechgate on {}:{}",
        settings.app.host, settings.app.port
    );

    let profile: BackendProfile = settings.backend.profile.parse()?;
    if settings.bootstrap.on_start && profile == BackendProfile::WhisperPiper {
        let bootstrap = voice_bootstrap(&settings);
        match bootstrap.ensure_voice(&settings.piper.default_voice).await {
            Ok(outcome) => info!(
                voice = %settings.piper.default_voice,
                ?outcome,
                "Default voice bootstrap finished"
            ),
            // Serving still works for whatever voices are already installed.
            Err(e) => error!(error = %e, "Default voice bootstrap failed"),
        }
    }

    let app_state = AppState::new(settings.clone())?;

    if settings.app.preload {
        info!("Preloading engines");
        if let Err(e) = app_state.speech.registry().preload().await {
            error!(error = %e, "Engine preload failed");
        }
    }

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
