use super::*;

#[test]
fn defaults_are_valid() {
    let cfg = PipelineConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.audio_sample_rate, 48_000);
    assert_eq!(cfg.audio_channels, 2);
    assert_eq!(cfg.codecs[0], CodecCandidate::new("h264", "mp4"));
    assert_eq!(cfg.tools.ffmpeg, PathBuf::from("ffmpeg"));
    assert!(cfg.encode_timeout().is_none());
}

#[test]
fn partial_json_fills_defaults() {
    let cfg: PipelineConfig = serde_json::from_str(
        r#"{
            "tools": {"ffmpeg": "/opt/ff/bin/ffmpeg"},
            "codecs": [{"codec": "vp9", "container": "webm"}],
            "encode_timeout_secs": 30
        }"#,
    )
    .unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.tools.ffmpeg, PathBuf::from("/opt/ff/bin/ffmpeg"));
    assert_eq!(cfg.tools.ffprobe, PathBuf::from("ffprobe"));
    assert_eq!(cfg.codecs.len(), 1);
    assert_eq!(cfg.encode_timeout(), Some(Duration::from_secs(30)));
    assert!(cfg.overwrite);
}

#[test]
fn validation_rejects_bad_values() {
    let mut cfg = PipelineConfig::default();
    cfg.codecs.clear();
    assert!(matches!(cfg.validate(), Err(MillError::Validation(_))));

    let mut cfg = PipelineConfig::default();
    cfg.audio_channels = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = PipelineConfig::default();
    cfg.encode_timeout_secs = Some(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn from_path_reports_missing_file() {
    let err = PipelineConfig::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(err.to_string().contains("read config"));
}
