use crate::fixtures::audio::install_voice;
use crate::fixtures::engines::{FakeAsr, FakeTts, StaticLoader, service, service_with};
use crate::fixtures::test_app::TestApp;
use serde_json::Value;
use speechgate_speech::{
    EngineLoader, PipelineConfig, Transcoder, VoiceCatalog, VoicePolicy, VoiceSource,
};
use std::sync::Arc;

#[tokio::test]
async fn lists_roster_voices() {
    let app = TestApp::spawn(service(
        Arc::new(FakeAsr::samples("hi")),
        Arc::new(FakeTts::new(24_000)),
        VoicePolicy::Lenient,
    ))
    .await;

    let resp = app.client.get(app.url("/voices")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["policy"], "lenient");
    assert_eq!(json["default"], "us_female");
    assert_eq!(
        json["voices"],
        serde_json::json!(["us_female", "us_male", "uk_female", "uk_male"])
    );
}

#[tokio::test]
async fn lists_installed_voices_sorted() {
    let dir = tempfile::tempdir().unwrap();
    install_voice(dir.path(), "en_US-ryan-high");
    install_voice(dir.path(), "de_DE-thorsten-medium");
    // Model without metadata is not installed.
    std::fs::write(dir.path().join("en_GB-alan-low.onnx"), b"onnx").unwrap();

    let speech = service_with(
        vec![Arc::new(StaticLoader::tts(Arc::new(FakeTts::new(22_050)))) as Arc<dyn EngineLoader>],
        VoiceCatalog::new(
            VoicePolicy::Strict,
            VoiceSource::Installed(dir.path().to_path_buf()),
            "en_US-ryan-high",
        ),
        Transcoder::new("ffmpeg", 200),
        PipelineConfig::default(),
    );
    let app = TestApp::spawn(speech).await;

    let json: Value = app
        .client
        .get(app.url("/voices"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["policy"], "strict");
    assert_eq!(
        json["voices"],
        serde_json::json!(["de_DE-thorsten-medium", "en_US-ryan-high"])
    );

    // Newly installed voices show up without a restart.
    install_voice(dir.path(), "en_GB-alan-low");
    let json: Value = app
        .client
        .get(app.url("/voices"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["voices"].as_array().unwrap().len(), 3);
}
