//! Fetches piper voice models into the voices directory.
//!
//! Files are streamed to `<name>.tmp` and renamed into place, so a reader
//! listing the directory never sees a half-written model.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Writing {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A piper voice id such as `en_US-amy-medium`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiperVoiceId {
    pub id: String,
    pub language: String,
    pub locale: String,
    pub name: String,
    pub quality: String,
}

impl PiperVoiceId {
    /// Parses `<lang>_<REGION>-<name>-<quality>`. Returns None for anything else.
    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.splitn(3, '-');
        let locale = parts.next()?;
        let name = parts.next()?;
        let quality = parts.next()?;
        let (language, region) = locale.split_once('_')?;
        if [language, region, name, quality].iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            language: language.to_string(),
            locale: locale.to_string(),
            name: name.to_string(),
            quality: quality.to_string(),
        })
    }

    /// Relative path of a file of this voice in the upstream repository.
    pub fn remote_path(&self, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.language, self.locale, self.name, self.quality, file_name
        )
    }

    pub fn file_names(&self) -> [String; 2] {
        [format!("{}.onnx", self.id), format!("{}.onnx.json", self.id)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    AlreadyPresent,
    Downloaded,
    /// The id is not a recognizable piper voice.
    Skipped,
}

pub struct VoiceBootstrap {
    client: reqwest::Client,
    base_url: String,
    voices_dir: PathBuf,
}

impl VoiceBootstrap {
    pub fn new(base_url: impl Into<String>, voices_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            voices_dir: voices_dir.into(),
        }
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    /// Makes sure both files of `voice` exist locally. Idempotent.
    pub async fn ensure_voice(&self, voice: &str) -> Result<BootstrapOutcome, BootstrapError> {
        let Some(id) = PiperVoiceId::parse(voice) else {
            warn!(voice, "Unknown voice id, skipping");
            return Ok(BootstrapOutcome::Skipped);
        };

        tokio::fs::create_dir_all(&self.voices_dir)
            .await
            .map_err(|e| BootstrapError::Io {
                path: self.voices_dir.clone(),
                source: e,
            })?;

        let mut downloaded = false;
        for file_name in id.file_names() {
            let target = self.voices_dir.join(&file_name);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                continue;
            }
            let url = format!("{}/{}", self.base_url, id.remote_path(&file_name));
            info!(voice, %url, "Downloading voice file");
            self.download(&url, &target).await?;
            downloaded = true;
        }

        if downloaded {
            info!(voice, dir = %self.voices_dir.display(), "Voice installed");
            Ok(BootstrapOutcome::Downloaded)
        } else {
            Ok(BootstrapOutcome::AlreadyPresent)
        }
    }

    async fn download(&self, url: &str, target: &Path) -> Result<(), BootstrapError> {
        let mut tmp_name = target.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let result = self.fetch_to(url, &tmp).await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }

        tokio::fs::rename(&tmp, target)
            .await
            .map_err(|e| BootstrapError::Io {
                path: target.to_path_buf(),
                source: e,
            })
    }

    async fn fetch_to(&self, url: &str, path: &Path) -> Result<(), BootstrapError> {
        let http_err = |e| BootstrapError::Http {
            url: url.to_string(),
            source: e,
        };
        let io_err = |e| BootstrapError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?;

        let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
        while let Some(chunk) = resp.chunk().await.map_err(http_err)? {
            file.write_all(&chunk).await.map_err(io_err)?;
        }
        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        Ok(())
    }
}
