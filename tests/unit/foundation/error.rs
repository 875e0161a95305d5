use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MillError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        MillError::incompatible_audio("x")
            .to_string()
            .contains("incompatible audio format:")
    );
    assert!(
        MillError::partial_write(7, "pipe closed")
            .to_string()
            .contains("frame 7")
    );
    assert!(
        MillError::InputNotFound(PathBuf::from("missing.mp4"))
            .to_string()
            .contains("missing.mp4")
    );
}

#[test]
fn no_codec_lists_every_attempt() {
    let err = MillError::NoCodecAvailable {
        tried: vec!["vp9/webm".to_string(), "h264/mp4".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "no codec available (tried: vp9/webm, h264/mp4)"
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MillError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
