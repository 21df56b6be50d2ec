use crate::fixtures::audio::{ffmpeg_available, install_voice, script, wav_shape};
use crate::fixtures::engines::{FakeAsr, FakeTts, StaticLoader, VOICES, roster, service, service_with};
use crate::fixtures::test_app::TestApp;
use serde_json::{Value, json};
use speechgate_speech::{
    EngineLoader, PipelineConfig, SpeechService, Transcoder, VoiceCatalog, VoicePolicy,
    VoiceSource,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn with_transcoder(tts: Arc<FakeTts>, program: &Path, config: PipelineConfig) -> SpeechService {
    service_with(
        vec![Arc::new(StaticLoader::tts(tts)) as Arc<dyn EngineLoader>],
        VoiceCatalog::new(VoicePolicy::Lenient, roster(), VOICES[0]),
        Transcoder::new(program.to_string_lossy(), 200),
        config,
    )
}

fn lenient(tts: Arc<FakeTts>) -> SpeechService {
    service(Arc::new(FakeAsr::samples("")), tts, VoicePolicy::Lenient)
}

#[tokio::test]
async fn blank_text_is_rejected() {
    let tts = Arc::new(FakeTts::new(24_000));
    let app = TestApp::spawn(lenient(tts.clone())).await;

    for body in [json!({ "text": "" }), json!({ "text": " \n\t " }), json!({ "voice": "us_male" })] {
        let resp = app.synthesize("?format=wav", body).await;
        assert_eq!(resp.status().as_u16(), 400);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "bad_request");
    }
    assert!(tts.voices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = TestApp::spawn(lenient(Arc::new(FakeTts::new(24_000)))).await;

    let resp = app
        .client
        .post(app.url("/synthesize"))
        .header("content-type", "application/json")
        .body("{\"text\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn unsupported_format_is_rejected() {
    let app = TestApp::spawn(lenient(Arc::new(FakeTts::new(24_000)))).await;

    let resp = app.synthesize("?format=mp3", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert!(json["message"].as_str().unwrap().contains("mp3"));
}

#[tokio::test]
async fn wav_output_is_mono_at_engine_rate() {
    let app = TestApp::spawn(lenient(Arc::new(FakeTts::new(22_050)))).await;

    let resp = app.synthesize("?format=WAV", json!({ "text": "Hello there." })).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/wav");
    let body = resp.bytes().await.unwrap();
    assert_eq!(wav_shape(&body), (1, 22_050, 11_025));
}

#[tokio::test]
async fn lenient_policy_substitutes_default_voice() {
    let tts = Arc::new(FakeTts::new(24_000));
    let app = TestApp::spawn(lenient(tts.clone())).await;

    let resp = app
        .synthesize("?format=wav", json!({ "text": "hi", "voice": "pirate" }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["x-voice"], "us_female");

    let resp = app
        .synthesize("?format=wav", json!({ "text": "hi", "voice": "uk_male" }))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(*tts.voices.lock().unwrap(), vec!["us_female", "uk_male"]);
}

#[tokio::test]
async fn strict_policy_rejects_unknown_voice_with_listing() {
    let dir = tempfile::tempdir().unwrap();
    install_voice(dir.path(), "en_US-amy-medium");
    install_voice(dir.path(), "en_GB-alan-low");

    let tts = Arc::new(FakeTts::new(22_050));
    let speech = service_with(
        vec![Arc::new(StaticLoader::tts(tts.clone())) as Arc<dyn EngineLoader>],
        VoiceCatalog::new(
            VoicePolicy::Strict,
            VoiceSource::Installed(dir.path().to_path_buf()),
            "en_US-amy-medium",
        ),
        Transcoder::new("ffmpeg", 200),
        PipelineConfig::default(),
    );
    let app = TestApp::spawn(speech).await;

    let resp = app
        .synthesize("?format=wav", json!({ "text": "hi", "voice": "en_US-nobody-high" }))
        .await;
    assert_eq!(resp.status().as_u16(), 404);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "voice_not_found");
    assert_eq!(json["available"], json!(["en_GB-alan-low", "en_US-amy-medium"]));
    assert!(tts.voices.lock().unwrap().is_empty());

    for voice in ["en_GB-alan-low", "en_US-amy-medium"] {
        let resp = app
            .synthesize("?format=wav", json!({ "text": "hi", "voice": voice }))
            .await;
        assert_eq!(resp.status().as_u16(), 200, "{voice}");
        assert_eq!(resp.headers()["x-voice"], voice);
    }

    // Omitted voice falls back to the default under either policy.
    let resp = app.synthesize("?format=wav", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn engine_without_audio_is_internal_error() {
    let app = TestApp::spawn(lenient(Arc::new(FakeTts::silent()))).await;

    let resp = app.synthesize("?format=wav", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 500);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["message"], "Model produced no audio output");
}

#[tokio::test]
async fn slow_engine_hits_inference_timeout() {
    let speech = service_with(
        vec![Arc::new(StaticLoader::tts(Arc::new(FakeTts::slow(Duration::from_secs(5))))) as Arc<dyn EngineLoader>],
        VoiceCatalog::new(VoicePolicy::Lenient, roster(), VOICES[0]),
        Transcoder::new("ffmpeg", 200),
        PipelineConfig {
            inference_timeout: Some(Duration::from_millis(100)),
            ..PipelineConfig::default()
        },
    );
    let app = TestApp::spawn(speech).await;

    let resp = app.synthesize("?format=wav", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 504);
}

#[tokio::test]
async fn ogg_is_the_default_format() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = script(dir.path(), "fake-ffmpeg", "cat > /dev/null\nprintf 'OggS-encoded'");
    let app = TestApp::spawn(with_transcoder(
        Arc::new(FakeTts::new(24_000)),
        &encoder,
        PipelineConfig::default(),
    ))
    .await;

    let resp = app.synthesize("", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/ogg");
    assert_eq!(&resp.bytes().await.unwrap()[..], b"OggS-encoded");
}

#[tokio::test]
async fn wav_output_bypasses_the_transcoder() {
    let app = TestApp::spawn(with_transcoder(
        Arc::new(FakeTts::new(24_000)),
        Path::new("speechgate-test-no-such-ffmpeg"),
        PipelineConfig::default(),
    ))
    .await;

    let resp = app.synthesize("?format=wav", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn missing_transcoder_is_unavailable() {
    let app = TestApp::spawn(with_transcoder(
        Arc::new(FakeTts::new(24_000)),
        Path::new("speechgate-test-no-such-ffmpeg"),
        PipelineConfig::default(),
    ))
    .await;

    let resp = app.synthesize("?format=ogg", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 503);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "service_unavailable");
}

#[tokio::test]
async fn hung_transcoder_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = script(dir.path(), "hung-ffmpeg", "sleep 10");
    let app = TestApp::spawn(with_transcoder(
        Arc::new(FakeTts::new(24_000)),
        &encoder,
        PipelineConfig {
            encode_timeout: Duration::from_millis(300),
            ..PipelineConfig::default()
        },
    ))
    .await;

    let resp = app.synthesize("?format=ogg", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 504);
}

#[tokio::test]
async fn failing_transcoder_reports_truncated_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = script(
        dir.path(),
        "broken-ffmpeg",
        "cat > /dev/null\nprintf '%0500d' 0 >&2\nexit 1",
    );
    let app = TestApp::spawn(with_transcoder(
        Arc::new(FakeTts::new(24_000)),
        &encoder,
        PipelineConfig::default(),
    ))
    .await;

    let resp = app.synthesize("?format=ogg", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 500);
    let json: Value = resp.json().await.unwrap();
    let message = json["message"].as_str().unwrap();
    assert!(message.contains(&"0".repeat(200)));
    assert!(!message.contains(&"0".repeat(201)));
}

#[tokio::test]
async fn encodes_ogg_opus_with_real_ffmpeg() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let app = TestApp::spawn(lenient(Arc::new(FakeTts::new(24_000)))).await;

    let resp = app.synthesize("?format=ogg", json!({ "text": "hi" })).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..4], b"OggS");
}
