use crate::error::ErrorKind;
use crate::validation::*;

const MIB: u64 = 1024 * 1024;

// ==================== API KEY ====================

#[test]
fn test_api_key_present() {
    assert_eq!(
        validate_api_key(Some("  sk-123 "), "ElevenLabs").unwrap(),
        "sk-123"
    );
}

#[test]
fn test_api_key_missing_or_blank() {
    for key in [None, Some(""), Some("   ")] {
        let error = validate_api_key(key, "ElevenLabs").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidApiKey);
        assert_eq!(
            error.message(),
            "ElevenLabs API key is missing. Please check your environment variables."
        );
        assert!(!error.kind().is_retryable_by_default());
    }
}

// ==================== FILE SIZE / TYPE ====================

#[test]
fn test_file_size_limit() {
    assert!(validate_file_size(10 * MIB, 10 * MIB).is_ok());

    let error = validate_file_size(10 * MIB + 1, 10 * MIB).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FileTooLarge);
    assert_eq!(error.message(), "File size exceeds 10MB limit");
}

#[test]
fn test_file_size_fractional_limit() {
    let error = validate_file_size(3 * MIB, MIB + MIB / 2).unwrap_err();
    assert_eq!(error.message(), "File size exceeds 1.5MB limit");
}

#[test]
fn test_file_type() {
    let allowed = ["image/png", "image/jpeg"];
    assert!(validate_file_type("image/png", &allowed).is_ok());
    assert!(validate_file_type("IMAGE/JPEG", &allowed).is_ok());

    let error = validate_file_type("image/gif", &allowed).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidFileType);
    assert_eq!(
        error.message(),
        "Invalid file type. Allowed types: image/png, image/jpeg"
    );
}

// ==================== UPLOAD CONSTRAINTS ====================

#[test]
fn test_portrait_image_constraints() {
    let constraints = UploadConstraints::PORTRAIT_IMAGE;

    assert!(constraints
        .check(&Upload::new("me.png", "image/png", 2 * MIB))
        .is_ok());

    let too_large = constraints
        .check(&Upload::new("me.png", "image/png", 11 * MIB))
        .unwrap_err();
    assert_eq!(too_large.kind(), ErrorKind::ImageTooLarge);

    let wrong_type = constraints
        .check(&Upload::new("me.bmp", "image/bmp", MIB))
        .unwrap_err();
    assert_eq!(wrong_type.kind(), ErrorKind::InvalidImageFormat);
}

#[test]
fn test_type_is_checked_before_size() {
    let error = UploadConstraints::PORTRAIT_IMAGE
        .check(&Upload::new("huge.tiff", "image/tiff", 500 * MIB))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidImageFormat);
}

#[test]
fn test_voice_samples() {
    let sample = Upload::new("take1.mp3", "audio/mpeg", 3 * MIB);
    assert!(validate_voice_samples(&[sample.clone()]).is_ok());

    let empty = validate_voice_samples(&[]).unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::FileUploadFailed);

    let too_many = vec![sample.clone(); MAX_VOICE_SAMPLES + 1];
    let error = validate_voice_samples(&too_many).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FileUploadFailed);
    assert!(error.message().contains("26 given"));

    let oversized = Upload::new("long.wav", "audio/wav", 16 * MIB);
    let error = validate_voice_samples(&[sample, oversized]).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FileTooLarge);
    assert_eq!(error.message(), "File size exceeds 15MB limit");
}

// ==================== VOICE SETTINGS ====================

#[test]
fn test_voice_settings_in_range() {
    let settings = VoiceSettings::new(0.0, 1.0, 0.3, 0.5, false).unwrap();
    assert_eq!(settings.stability(), 0.0);
    assert_eq!(settings.similarity_boost(), 1.0);
    assert_eq!(settings.speaking_rate(), 0.5);
    assert!(!settings.use_highest_quality());
}

#[test]
fn test_voice_settings_out_of_range() {
    let error = VoiceSettings::new(1.2, 0.5, 0.5, 1.0, true).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidVoiceSettings);
    assert_eq!(error.message(), "stability must be at most 1");

    let error = VoiceSettings::new(0.5, 0.5, 0.5, 0.25, true).unwrap_err();
    assert_eq!(error.message(), "speaking_rate must be at least 0.5");

    let error = VoiceSettings::new(0.5, f64::NAN, 0.5, 1.0, true).unwrap_err();
    assert_eq!(error.message(), "similarity_boost must be a finite number");
}

#[test]
fn test_voice_settings_default_is_valid() {
    let d = VoiceSettings::default();
    assert!(VoiceSettings::new(
        d.stability(),
        d.similarity_boost(),
        d.style(),
        d.speaking_rate(),
        d.use_highest_quality()
    )
    .is_ok());
}

#[test]
fn test_voice_settings_deserialize_validates() {
    let ok: VoiceSettings = serde_json::from_str(
        r#"{"stability":0.4,"similarity_boost":0.8,"style":0.1,"speaking_rate":1.5,"use_highest_quality":true}"#,
    )
    .unwrap();
    assert_eq!(ok.speaking_rate(), 1.5);

    let err = serde_json::from_str::<VoiceSettings>(
        r#"{"stability":0.4,"similarity_boost":0.8,"style":0.1,"speaking_rate":3.0,"use_highest_quality":true}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("speaking_rate must be at most 2"));
}

// ==================== VIDEO SETTINGS ====================

#[test]
fn test_video_settings_builder() {
    let settings = VideoSettings::builder()
        .expression_scale(2.0)
        .pose_style(2)
        .quality(VideoQuality::Low)
        .fps(30)
        .build()
        .unwrap();

    assert_eq!(settings.expression_scale(), 2.0);
    assert_eq!(settings.pose_style(), 2);
    assert_eq!(settings.quality(), VideoQuality::Low);
    assert_eq!(settings.fps(), 30);
    assert!(settings.enhancer());
}

#[test]
fn test_video_settings_rejections() {
    let cases = [
        (VideoSettings::builder().expression_scale(2.5), "expression_scale must be at most 2"),
        (VideoSettings::builder().lip_sync_accuracy(-0.1), "lip_sync_accuracy must be at least 0"),
        (VideoSettings::builder().pose_style(3), "pose_style must be at most 2"),
        (VideoSettings::builder().fps(0), "fps must be between 1 and 60"),
        (VideoSettings::builder().motion_smoothing(f64::INFINITY), "motion_smoothing must be a finite number"),
    ];

    for (builder, message) in cases {
        let error = builder.build().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidVideoSettings);
        assert_eq!(error.message(), message);
    }
}

#[test]
fn test_video_settings_deserialize_defaults_quality() {
    let settings: VideoSettings = serde_json::from_str(
        r#"{"enhancer":false,"expression_scale":1.0,"pose_style":1,"lip_sync_accuracy":0.9,"motion_smoothing":0.2,"fps":24}"#,
    )
    .unwrap();
    assert_eq!(settings.quality(), VideoQuality::High);
    assert!(!settings.enhancer());

    assert!(serde_json::from_str::<VideoSettings>(
        r#"{"enhancer":true,"expression_scale":1.0,"pose_style":7,"lip_sync_accuracy":0.9,"motion_smoothing":0.2,"fps":24}"#,
    )
    .is_err());
}
