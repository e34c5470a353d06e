//! Input validation and sanitisation shared by the tracker and the HTTP layer.

use crate::constants::ERROR_MESSAGE_MAX_LEN;
use crate::error::{VideoError, VideoResult};

const MAX_REMOTE_KEY_LEN: usize = 255;

/// Video MIME types accepted for upload, with the file extension used for object keys.
const VIDEO_MIME_TYPES: &[(&str, &str)] = &[
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("video/quicktime", "mov"),
    ("video/x-msvideo", "avi"),
    ("video/x-matroska", "mkv"),
    ("video/mpeg", "mpeg"),
    ("video/ogg", "ogv"),
    ("video/3gpp", "3gp"),
    ("video/x-m4v", "m4v"),
];

/// Strip control characters and cap the length of an error message before it is stored.
pub fn sanitize_error_message(message: &str) -> String {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(ERROR_MESSAGE_MAX_LEN).collect()
}

/// Reject anything that is not a known video container.
pub fn validate_video_mime_type(mime_type: &str) -> VideoResult<()> {
    extension_for_mime(mime_type).map(|_| ())
}

/// File extension for a supported video MIME type.
pub fn extension_for_mime(mime_type: &str) -> VideoResult<&'static str> {
    let normalized = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    VIDEO_MIME_TYPES
        .iter()
        .find(|(mime, _)| *mime == normalized)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            VideoError::Validation(format!("Unsupported video type: {}", mime_type))
        })
}

/// Remote keys are opaque but must be printable and path-safe.
pub fn validate_remote_key(remote_key: &str) -> VideoResult<()> {
    if remote_key.is_empty() {
        return Err(VideoError::InvalidIdentifier(
            "Video identifier is missing".to_string(),
        ));
    }
    if remote_key.len() > MAX_REMOTE_KEY_LEN
        || remote_key.contains("..")
        || remote_key.starts_with('/')
        || !remote_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
    {
        return Err(VideoError::InvalidIdentifier(
            "Video identifier is malformed".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_control_characters() {
        let out = sanitize_error_message("bad\u{0}\nthing\t happened");
        assert_eq!(out, "bad thing happened");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(ERROR_MESSAGE_MAX_LEN * 2);
        assert_eq!(sanitize_error_message(&long).chars().count(), ERROR_MESSAGE_MAX_LEN);
    }

    #[test]
    fn mime_types() {
        assert_eq!(extension_for_mime("video/mp4").unwrap(), "mp4");
        assert_eq!(extension_for_mime("Video/QuickTime; codecs=x").unwrap(), "mov");
        assert!(validate_video_mime_type("image/png").is_err());
    }

    #[test]
    fn remote_keys() {
        assert!(validate_remote_key("ea95132c15732412d22c1476fa83f27a").is_ok());
        assert!(validate_remote_key("submissions/7/42/abc.mp4").is_ok());
        assert!(validate_remote_key("").is_err());
        assert!(validate_remote_key("../etc/passwd").is_err());
        assert!(validate_remote_key("a b").is_err());
    }
}
