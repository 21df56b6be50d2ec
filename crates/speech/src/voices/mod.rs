pub mod bootstrap;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use crate::error::SpeechError;

/// What to do with a requested voice that is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePolicy {
    /// Unknown voice is a hard error listing the available set.
    Strict,
    /// Unknown voice silently falls back to the default.
    Lenient,
}

impl FromStr for VoicePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(VoicePolicy::Strict),
            "lenient" => Ok(VoicePolicy::Lenient),
            other => Err(format!(
                "Unknown voice policy '{}' (expected 'strict' or 'lenient')",
                other
            )),
        }
    }
}

impl fmt::Display for VoicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoicePolicy::Strict => f.write_str("strict"),
            VoicePolicy::Lenient => f.write_str("lenient"),
        }
    }
}

/// Where the set of available voices comes from.
#[derive(Debug, Clone)]
pub enum VoiceSource {
    /// Per-voice model files in a directory, rescanned on every lookup.
    Installed(PathBuf),
    /// Fixed speaker roster baked into one model.
    Roster(Vec<String>),
}

/// The voice actually used for a synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    pub requested: Option<String>,
    pub resolved: String,
}

impl VoiceSelection {
    pub fn substituted(&self) -> bool {
        self.requested.as_deref().is_some_and(|r| r != self.resolved)
    }
}

/// Resolves a requested voice against `available`.
///
/// Blank requests count as absent. The default is not checked against
/// `available`; installing it is an operational concern.
pub fn resolve(
    policy: VoicePolicy,
    requested: Option<&str>,
    available: &[String],
    default: &str,
) -> Result<VoiceSelection, SpeechError> {
    let requested = requested.map(str::trim).filter(|r| !r.is_empty());

    let Some(name) = requested else {
        return Ok(VoiceSelection {
            requested: None,
            resolved: default.to_string(),
        });
    };

    if available.iter().any(|v| v == name) {
        return Ok(VoiceSelection {
            requested: Some(name.to_string()),
            resolved: name.to_string(),
        });
    }

    match policy {
        VoicePolicy::Strict => Err(SpeechError::VoiceNotFound {
            requested: name.to_string(),
            available: available.to_vec(),
        }),
        VoicePolicy::Lenient => Ok(VoiceSelection {
            requested: Some(name.to_string()),
            resolved: default.to_string(),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    policy: VoicePolicy,
    source: VoiceSource,
    default: String,
}

impl VoiceCatalog {
    pub fn new(policy: VoicePolicy, source: VoiceSource, default: impl Into<String>) -> Self {
        Self {
            policy,
            source,
            default: default.into(),
        }
    }

    pub fn policy(&self) -> VoicePolicy {
        self.policy
    }

    pub fn default_voice(&self) -> &str {
        &self.default
    }

    /// Currently available voices, sorted for installed voice directories.
    pub fn available(&self) -> Vec<String> {
        match &self.source {
            VoiceSource::Installed(dir) => installed_voices(dir),
            VoiceSource::Roster(names) => names.clone(),
        }
    }

    pub fn resolve(&self, requested: Option<&str>) -> Result<VoiceSelection, SpeechError> {
        resolve(self.policy, requested, &self.available(), &self.default)
    }
}

/// Lists voices in `dir` that have both `<voice>.onnx` and `<voice>.onnx.json`.
pub fn installed_voices(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Voice directory is not readable");
            return Vec::new();
        }
    };

    let mut voices: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let voice = name.strip_suffix(".onnx")?.to_string();
            dir.join(format!("{}.onnx.json", voice))
                .is_file()
                .then_some(voice)
        })
        .collect();
    voices.sort();
    voices
}
