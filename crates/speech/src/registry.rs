use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info};

use crate::asr::AsrEngine;
use crate::tts::TtsEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Asr,
    Tts,
    /// One engine serving both capabilities.
    Combined,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Asr => f.write_str("asr"),
            EngineKind::Tts => f.write_str("tts"),
            EngineKind::Combined => f.write_str("combined"),
        }
    }
}

/// A loaded inference capability.
#[derive(Clone)]
pub enum EngineHandle {
    Asr(Arc<dyn AsrEngine>),
    Tts(Arc<dyn TtsEngine>),
    Combined {
        asr: Arc<dyn AsrEngine>,
        tts: Arc<dyn TtsEngine>,
    },
}

impl EngineHandle {
    pub fn combined<E: AsrEngine + TtsEngine>(engine: Arc<E>) -> Self {
        EngineHandle::Combined {
            asr: engine.clone(),
            tts: engine,
        }
    }

    pub fn asr(&self) -> Option<Arc<dyn AsrEngine>> {
        match self {
            EngineHandle::Asr(asr) | EngineHandle::Combined { asr, .. } => Some(Arc::clone(asr)),
            EngineHandle::Tts(_) => None,
        }
    }

    pub fn tts(&self) -> Option<Arc<dyn TtsEngine>> {
        match self {
            EngineHandle::Tts(tts) | EngineHandle::Combined { tts, .. } => Some(Arc::clone(tts)),
            EngineHandle::Asr(_) => None,
        }
    }
}

/// Captured failure of an engine load. Returned unchanged to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{backend} engine failed to load: {message}")]
pub struct EngineLoadError {
    pub backend: String,
    pub message: String,
}

/// Builds one engine. Called at most once per process.
#[async_trait]
pub trait EngineLoader: Send + Sync + 'static {
    fn kind(&self) -> EngineKind;

    fn backend(&self) -> &str;

    async fn load(&self) -> anyhow::Result<EngineHandle>;
}

#[derive(Clone)]
enum SlotState {
    NotLoaded,
    Loading,
    Ready(EngineHandle),
    Failed(EngineLoadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub kind: EngineKind,
    pub backend: String,
    pub state: LoadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Load-once cell for a single engine.
pub struct EngineSlot {
    loader: Arc<dyn EngineLoader>,
    state: Arc<RwLock<SlotState>>,
    load_lock: Arc<tokio::sync::Mutex<()>>,
    load_attempts: Arc<AtomicUsize>,
}

impl EngineSlot {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            state: Arc::new(RwLock::new(SlotState::NotLoaded)),
            load_lock: Arc::new(tokio::sync::Mutex::new(())),
            load_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.loader.kind()
    }

    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    fn settled(&self) -> Option<Result<EngineHandle, EngineLoadError>> {
        match &*self.state.read() {
            SlotState::Ready(handle) => Some(Ok(handle.clone())),
            SlotState::Failed(err) => Some(Err(err.clone())),
            SlotState::NotLoaded | SlotState::Loading => None,
        }
    }

    /// Returns the engine, loading it first if no load has happened yet.
    ///
    /// Concurrent callers wait on the single in-flight load. The load itself
    /// runs in a spawned task and completes even if every caller goes away.
    pub async fn ensure_ready(&self) -> Result<EngineHandle, EngineLoadError> {
        if let Some(settled) = self.settled() {
            return settled;
        }

        let guard = Arc::clone(&self.load_lock).lock_owned().await;

        if let Some(settled) = self.settled() {
            return settled;
        }

        *self.state.write() = SlotState::Loading;
        self.load_attempts.fetch_add(1, Ordering::SeqCst);

        let loader = Arc::clone(&self.loader);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let _guard = guard;
            let backend = loader.backend().to_string();
            let kind = loader.kind();
            info!(%backend, %kind, "Loading engine");
            let start = Instant::now();

            // A panicking loader settles the slot as failed like any other error.
            let loaded = AssertUnwindSafe(loader.load())
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow::anyhow!("loader panicked: {}", panic_message(&*panic)))
                });

            let outcome = match loaded {
                Ok(handle) => {
                    info!(
                        %backend,
                        %kind,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Engine ready"
                    );
                    Ok(handle)
                }
                Err(e) => {
                    let err = EngineLoadError {
                        backend: backend.clone(),
                        message: format!("{:#}", e),
                    };
                    error!(%backend, %kind, error = %err.message, "Engine load failed");
                    Err(err)
                }
            };

            *state.write() = match &outcome {
                Ok(handle) => SlotState::Ready(handle.clone()),
                Err(err) => SlotState::Failed(err.clone()),
            };
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = EngineLoadError {
                    backend: self.loader.backend().to_string(),
                    message: format!("load task aborted: {}", e),
                };
                *self.state.write() = SlotState::Failed(err.clone());
                Err(err)
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        let (state, error) = match &*self.state.read() {
            SlotState::NotLoaded => (LoadState::NotLoaded, None),
            SlotState::Loading => (LoadState::Loading, None),
            SlotState::Ready(_) => (LoadState::Ready, None),
            SlotState::Failed(err) => (LoadState::Failed, Some(err.message.clone())),
        };
        EngineStatus {
            kind: self.loader.kind(),
            backend: self.loader.backend().to_string(),
            state,
            error,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Owns every engine slot of the process.
pub struct EngineRegistry {
    slots: Vec<EngineSlot>,
}

impl EngineRegistry {
    pub fn new(loaders: Vec<Arc<dyn EngineLoader>>) -> Self {
        Self {
            slots: loaders.into_iter().map(EngineSlot::new).collect(),
        }
    }

    /// The slot serving `kind`: an exact match first, then a combined engine.
    fn slot_for(&self, kind: EngineKind) -> Option<&EngineSlot> {
        self.slots
            .iter()
            .find(|s| s.kind() == kind)
            .or_else(|| self.slots.iter().find(|s| s.kind() == EngineKind::Combined))
    }

    pub async fn ensure_ready(&self, kind: EngineKind) -> Result<EngineHandle, EngineLoadError> {
        match self.slot_for(kind) {
            Some(slot) => slot.ensure_ready().await,
            None => Err(EngineLoadError {
                backend: "none".to_string(),
                message: format!("no {} engine configured", kind),
            }),
        }
    }

    pub async fn asr(&self) -> Result<Arc<dyn AsrEngine>, EngineLoadError> {
        let handle = self.ensure_ready(EngineKind::Asr).await?;
        handle.asr().ok_or_else(|| EngineLoadError {
            backend: "none".to_string(),
            message: "configured engine cannot transcribe".to_string(),
        })
    }

    pub async fn tts(&self) -> Result<Arc<dyn TtsEngine>, EngineLoadError> {
        let handle = self.ensure_ready(EngineKind::Tts).await?;
        handle.tts().ok_or_else(|| EngineLoadError {
            backend: "none".to_string(),
            message: "configured engine cannot synthesize".to_string(),
        })
    }

    /// Current state of every slot. Never triggers a load.
    pub fn status(&self) -> Vec<EngineStatus> {
        self.slots.iter().map(EngineSlot::status).collect()
    }

    /// Backend identifiers, in configuration order.
    pub fn backends(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|s| s.loader.backend().to_string())
            .collect()
    }

    /// Loads every engine now. The first failure is returned; all slots are attempted.
    pub async fn preload(&self) -> Result<(), EngineLoadError> {
        let results = futures::future::join_all(self.slots.iter().map(EngineSlot::ensure_ready)).await;
        results.into_iter().try_for_each(|r| r.map(|_| ()))
    }

    pub fn load_attempts(&self) -> usize {
        self.slots.iter().map(EngineSlot::load_attempts).sum()
    }
}
