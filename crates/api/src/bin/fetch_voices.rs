//! Downloads piper voices into the configured voices directory.
//!
//! ```text
//! speechgate-fetch-voices                      # configured default voice
//! speechgate-fetch-voices en_GB-alan-medium de_DE-thorsten-high
//! ```

use clap::Parser;
use speechgate_config::Settings;
use speechgate_speech::voice_bootstrap;
use speechgate_speech::voices::bootstrap::{BootstrapOutcome, VoiceBootstrap};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "speechgate-fetch-voices", about = "Fetch piper voices")]
struct Args {
    /// Voice ids such as `en_US-amy-medium`. Defaults to the configured default voice.
    voices: Vec<String>,

    /// Override the target directory.
    #[arg(long)]
    voices_dir: Option<String>,

    /// Override the download base URL.
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speechgate_speech=info,speechgate_fetch_voices=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load()?;

    let configured = voice_bootstrap(&settings);
    let bootstrap = match (&args.voices_dir, &args.base_url) {
        (None, None) => configured,
        (dir, url) => VoiceBootstrap::new(
            url.clone()
                .unwrap_or_else(|| settings.piper.download_base_url.clone()),
            dir.clone()
                .map(Into::into)
                .unwrap_or_else(|| configured.voices_dir().to_path_buf()),
        ),
    };

    let voices = if args.voices.is_empty() {
        vec![settings.piper.default_voice.clone()]
    } else {
        args.voices
    };

    let mut failures = 0;
    for voice in &voices {
        match bootstrap.ensure_voice(voice).await {
            Ok(BootstrapOutcome::Downloaded) => info!(%voice, "Downloaded"),
            Ok(BootstrapOutcome::AlreadyPresent) => info!(%voice, "Already present"),
            Ok(BootstrapOutcome::Skipped) => info!(%voice, "Not a piper voice id, skipped"),
            Err(e) => {
                error!(%voice, error = %e, "Download failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} voices failed", failures, voices.len());
    }
    info!(dir = %bootstrap.voices_dir().display(), "Voices ready");
    Ok(())
}
