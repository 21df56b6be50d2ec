use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::TtsEngine;
use crate::audio::Waveform;
use crate::process::run_process;

pub const KOKORO_SAMPLE_RATE: u32 = 24000;
const STYLE_DIM: usize = 256;
/// Context length of the model, pads included.
const MAX_TOKENS: usize = 510;
const PHONEMIZE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct KokoroOptions {
    pub model_path: String,
    pub voices_dir: PathBuf,
    pub speakers: Vec<String>,
    pub espeak_binary: String,
    pub language: String,
    pub speed: f32,
    pub diagnostic_limit: usize,
}

/// Kokoro-82M ONNX TTS with a closed speaker roster.
pub struct KokoroTts {
    session: Arc<Mutex<Session>>,
    token_input: String,
    styles: HashMap<String, Arc<Vec<f32>>>,
    vocab: HashMap<char, i64>,
    espeak_binary: String,
    language: String,
    speed: f32,
    diagnostic_limit: usize,
}

impl KokoroTts {
    pub fn new(options: KokoroOptions) -> anyhow::Result<Self> {
        info!(model_path = %options.model_path, "Loading Kokoro model");
        let session = Session::builder()
            .map_err(|e| anyhow::anyhow!("Failed to create ORT session builder: {}", e))?
            .commit_from_file(&options.model_path)
            .map_err(|e| {
                anyhow::anyhow!("Failed to load Kokoro model '{}': {}", options.model_path, e)
            })?;

        // "input_ids" for onnx-community exports, "tokens" for the original export
        let token_input = session
            .inputs()
            .iter()
            .find(|i| i.name() == "input_ids" || i.name() == "tokens")
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input_ids".to_string());

        let mut styles = HashMap::new();
        for speaker in &options.speakers {
            let path = options.voices_dir.join(format!("{}.bin", speaker));
            match load_style_table(&path) {
                Ok(table) => {
                    styles.insert(speaker.clone(), Arc::new(table));
                }
                Err(e) => warn!(speaker, error = %e, "Speaker style table unavailable"),
            }
        }
        if styles.is_empty() {
            anyhow::bail!(
                "No speaker style tables found in {}",
                options.voices_dir.display()
            );
        }

        info!(
            speakers = styles.len(),
            token_input = %token_input,
            "Kokoro model loaded"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            token_input,
            styles,
            vocab: build_vocab(),
            espeak_binary: options.espeak_binary,
            language: options.language,
            speed: options.speed,
            diagnostic_limit: options.diagnostic_limit,
        })
    }

    async fn phonemize(&self, text: &str) -> anyhow::Result<String> {
        let args = ["--ipa", "-q", "-v", self.language.as_str(), "--stdin"];
        let out = run_process(
            &self.espeak_binary,
            args,
            text.as_bytes().to_vec(),
            PHONEMIZE_TIMEOUT,
            self.diagnostic_limit,
        )
        .await?;
        Ok(filter_phonemes(&String::from_utf8_lossy(&out), &self.vocab))
    }
}

/// Reads a raw little-endian f32 table with `STYLE_DIM` values per row.
fn load_style_table(path: &Path) -> anyhow::Result<Vec<f32>> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path.display(), e))?;
    if bytes.is_empty() || bytes.len() % (4 * STYLE_DIM) != 0 {
        anyhow::bail!(
            "'{}' is not a style table ({} bytes)",
            path.display(),
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Style row for an utterance of `n_tokens` (pads excluded).
fn style_row(table: &[f32], n_tokens: usize) -> &[f32] {
    let rows = table.len() / STYLE_DIM;
    let row = n_tokens.min(rows.saturating_sub(1));
    &table[row * STYLE_DIM..(row + 1) * STYLE_DIM]
}

fn build_vocab() -> HashMap<char, i64> {
    let pad = "$";
    let punctuation = r#";:,.!?¡¿—…"«»"" "#;
    let letters = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let letters_ipa = "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘'̩'ᵻ";

    [pad, punctuation, letters, letters_ipa]
        .concat()
        .chars()
        .enumerate()
        .map(|(idx, c)| (c, idx as i64))
        .collect()
}

/// Joins espeak clauses and drops symbols the model has no token for.
fn filter_phonemes(raw: &str, vocab: &HashMap<char, i64>) -> String {
    let filtered: String = raw
        .replace('\n', " ")
        .chars()
        .filter(|c| c.is_whitespace() || vocab.contains_key(c))
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(phonemes: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    phonemes
        .chars()
        .filter_map(|c| vocab.get(&c).copied())
        .collect()
}

/// Phoneme characters a chunk may end on without cutting a word.
const BREAK_PUNCTUATION: &str = ";:,.!?¡¿—…";

/// Tokenizes `phonemes` into chunks of at most `max` tokens, cutting only after
/// whitespace or punctuation. A single word longer than `max` is cut where it must be.
fn chunk_tokens(phonemes: &str, vocab: &HashMap<char, i64>, max: usize) -> Vec<Vec<i64>> {
    let mut chunks = Vec::new();
    let mut current: Vec<i64> = Vec::new();

    let is_break = |c: char| c.is_whitespace() || BREAK_PUNCTUATION.contains(c);
    for word in phonemes.split_inclusive(is_break) {
        let mut tokens = tokenize(word, vocab);
        if !current.is_empty() && current.len() + tokens.len() > max {
            chunks.push(std::mem::take(&mut current));
        }
        while tokens.len() > max {
            let rest = tokens.split_off(max);
            chunks.push(tokens);
            tokens = rest;
        }
        current.extend(tokens);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn infer(
    session: &mut Session,
    token_input: &str,
    tokens: &[i64],
    style: &[f32],
    speed: f32,
) -> anyhow::Result<Vec<f32>> {
    let mut padded = Vec::with_capacity(tokens.len() + 2);
    padded.push(0);
    padded.extend_from_slice(tokens);
    padded.push(0);

    let ids = Array2::from_shape_vec((1, padded.len()), padded)
        .map_err(|e| anyhow::anyhow!("Token array shape error: {}", e))?;
    let ids_val =
        Tensor::from_array(ids).map_err(|e| anyhow::anyhow!("Token tensor error: {}", e))?;
    let style_arr = Array2::from_shape_vec((1, STYLE_DIM), style.to_vec())
        .map_err(|e| anyhow::anyhow!("Style array shape error: {}", e))?;
    let style_val =
        Tensor::from_array(style_arr).map_err(|e| anyhow::anyhow!("Style tensor error: {}", e))?;
    let speed_val = Tensor::from_array(Array1::from_vec(vec![speed]))
        .map_err(|e| anyhow::anyhow!("Speed tensor error: {}", e))?;

    let outputs = session
        .run(ort::inputs!(token_input => ids_val, "style" => style_val, "speed" => speed_val))
        .map_err(|e| anyhow::anyhow!("Kokoro inference error: {}", e))?;

    let (_shape, audio) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| anyhow::anyhow!("Output extraction error: {}", e))?;
    Ok(audio.to_vec())
}

#[async_trait]
impl TtsEngine for KokoroTts {
    async fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Waveform> {
        let style_table = self
            .styles
            .get(voice)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No style table loaded for speaker '{}'", voice))?;

        let phonemes = self.phonemize(text).await?;
        let chunks = chunk_tokens(&phonemes, &self.vocab, MAX_TOKENS - 2);
        if chunks.is_empty() {
            return Ok(Waveform::new(Vec::new(), KOKORO_SAMPLE_RATE));
        }

        let session = Arc::clone(&self.session);
        let token_input = self.token_input.clone();
        let speed = self.speed;

        let samples = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<f32>> {
            let mut session = session.lock();
            let mut samples = Vec::new();
            for chunk in &chunks {
                let style = style_row(&style_table, chunk.len());
                samples.extend(infer(&mut session, &token_input, chunk, style, speed)?);
            }
            Ok(samples)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Kokoro task join error: {}", e))??;

        debug!(voice, samples = samples.len(), "Kokoro synthesis complete");
        Ok(Waveform::new(samples, KOKORO_SAMPLE_RATE))
    }

    fn name(&self) -> &str {
        "kokoro"
    }
}
