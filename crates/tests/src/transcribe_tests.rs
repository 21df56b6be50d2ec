use crate::fixtures::audio::{ffmpeg_available, tone_wav};
use crate::fixtures::engines::{
    FailingAsr, FailingLoader, FakeAsr, FakeTts, StaticLoader, VOICES, roster, service,
    service_with,
};
use crate::fixtures::test_app::TestApp;
use serde_json::Value;
use speechgate_speech::{
    EngineKind, EngineLoader, PipelineConfig, Transcoder, VoiceCatalog, VoicePolicy,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn app_service(asr: Arc<FakeAsr>) -> speechgate_speech::SpeechService {
    service(asr, Arc::new(FakeTts::new(24_000)), VoicePolicy::Lenient)
}

#[tokio::test]
async fn transcribes_wav_upload() {
    let asr = Arc::new(FakeAsr::samples("hello world"));
    let app = TestApp::spawn(app_service(asr.clone())).await;

    let resp = app.upload(tone_wav(16_000, 1.0), "clip.wav").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["text"], "hello world");
    assert_eq!(*asr.received.lock().unwrap(), vec![16_000]);
}

#[tokio::test]
async fn resamples_to_engine_rate() {
    let asr = Arc::new(FakeAsr::samples("resampled"));
    let app = TestApp::spawn(app_service(asr.clone())).await;

    let resp = app.upload(tone_wav(48_000, 1.0), "clip.wav").await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(*asr.received.lock().unwrap(), vec![16_000]);
}

#[tokio::test]
async fn file_path_engine_receives_original_bytes() {
    let asr = Arc::new(FakeAsr::file_path("from file"));
    let app = TestApp::spawn(app_service(asr.clone())).await;

    let upload = tone_wav(16_000, 0.5);
    let len = upload.len();
    let resp = app.upload(upload, "clip.wav").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["text"], "from file");
    assert_eq!(*asr.received.lock().unwrap(), vec![len]);
}

#[tokio::test]
async fn silent_transcript_is_empty_text() {
    let asr = Arc::new(FakeAsr::samples(""));
    let app = TestApp::spawn(app_service(asr.clone())).await;

    let resp = app.upload(tone_wav(16_000, 0.5), "quiet.wav").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["text"], "");
    assert_eq!(asr.received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_over_configured_limit_is_rejected() {
    let asr = Arc::new(FakeAsr::samples("never"));
    let app = TestApp::spawn_with_settings(app_service(asr.clone()), |settings| {
        settings.app.max_upload_bytes = 4 * 1024;
    })
    .await;

    let resp = app.upload(tone_wav(16_000, 1.0), "big.wav").await;
    assert_eq!(resp.status().as_u16(), 413);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "payload_too_large");
    assert!(asr.received.lock().unwrap().is_empty());

    let resp = app.upload(tone_wav(16_000, 0.05), "small.wav").await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn m4a_with_index_at_end_is_decoded() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("voice-memo.m4a");
    // Without +faststart the mp4 muxer writes the moov atom after the media data.
    let status = std::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-f", "lavfi"])
        .args(["-i", "sine=frequency=440:duration=1", "-c:a", "aac", "-y"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());
    let bytes = std::fs::read(&path).unwrap();
    let find = |tag: &[u8]| bytes.windows(4).position(|w| w == tag).unwrap();
    assert!(find(b"mdat") < find(b"moov"));

    let asr = Arc::new(FakeAsr::samples("memo"));
    let app = TestApp::spawn(app_service(asr.clone())).await;
    let resp = app.upload(bytes, "voice-memo.m4a").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["text"], "memo");
    let frames = asr.received.lock().unwrap()[0];
    assert!((15_000..=17_000).contains(&frames), "decoded {frames} frames");
}

#[tokio::test]
async fn accepts_file_field_name() {
    let app = TestApp::spawn(app_service(Arc::new(FakeAsr::samples("ok")))).await;

    let part = reqwest::multipart::Part::bytes(tone_wav(16_000, 0.2)).file_name("a.wav");
    let form = reqwest::multipart::Form::new()
        .text("note", "ignored")
        .part("file", part);
    let resp = app
        .client
        .post(app.url("/transcribe"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let asr = Arc::new(FakeAsr::samples("never"));
    let app = TestApp::spawn(app_service(asr.clone())).await;

    let resp = app.upload(Vec::new(), "empty.wav").await;
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "bad_request");
    assert!(asr.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_body_is_rejected_whatever_the_content_type() {
    let app = TestApp::spawn(app_service(Arc::new(FakeAsr::samples("never")))).await;

    for content_type in ["application/json", "multipart/form-data; boundary=x", "text/plain"] {
        let resp = app
            .client
            .post(app.url("/transcribe"))
            .header("content-type", content_type)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "{content_type}");
    }
}

#[tokio::test]
async fn missing_audio_field_is_rejected() {
    let app = TestApp::spawn(app_service(Arc::new(FakeAsr::samples("never")))).await;

    let form = reqwest::multipart::Form::new().text("language", "en");
    let resp = app
        .client
        .post(app.url("/transcribe"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn engine_failure_is_internal_error() {
    let app = TestApp::spawn(service(
        Arc::new(FailingAsr),
        Arc::new(FakeTts::new(24_000)),
        VoicePolicy::Lenient,
    ))
    .await;

    let resp = app.upload(tone_wav(16_000, 0.2), "clip.wav").await;
    assert_eq!(resp.status().as_u16(), 500);
    let json: Value = resp.json().await.unwrap();
    assert!(json["message"].as_str().unwrap().contains("decoder state corrupted"));
}

#[tokio::test]
async fn undecodable_upload_without_transcoder_is_unavailable() {
    let speech = service_with(
        vec![Arc::new(StaticLoader::asr(Arc::new(FakeAsr::samples("never")))) as Arc<dyn EngineLoader>],
        VoiceCatalog::new(VoicePolicy::Lenient, roster(), VOICES[0]),
        Transcoder::new("speechgate-test-no-such-ffmpeg", 200),
        PipelineConfig::default(),
    );
    let app = TestApp::spawn(speech).await;

    let resp = app.upload(b"ID3 not really mp3".to_vec(), "clip.mp3").await;
    assert_eq!(resp.status().as_u16(), 503);
}

#[tokio::test]
async fn failed_load_is_not_retried() {
    let loader = Arc::new(FailingLoader::new(EngineKind::Asr));
    let attempts = loader.attempts.clone();
    let speech = service_with(
        vec![loader as Arc<dyn EngineLoader>],
        VoiceCatalog::new(VoicePolicy::Lenient, roster(), VOICES[0]),
        Transcoder::new("ffmpeg", 200),
        PipelineConfig::default(),
    );
    let app = TestApp::spawn(speech).await;

    let mut messages = Vec::new();
    for _ in 0..3 {
        let resp = app.upload(tone_wav(16_000, 0.2), "clip.wav").await;
        assert_eq!(resp.status().as_u16(), 500);
        let json: Value = resp.json().await.unwrap();
        messages.push(json["message"].as_str().unwrap().to_string());
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(messages.windows(2).all(|w| w[0] == w[1]));
}
