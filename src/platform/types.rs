use serde::{Deserialize, Serialize};

/// One message as fetched from a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

impl RawMessage {
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// Text-only message.
    pub fn text(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: Some(text.into()),
            media: Vec::new(),
        }
    }

    /// Message carrying one photo and no text.
    pub fn photo(id: i64) -> Self {
        Self {
            id,
            text: None,
            media: vec![MediaRef::photo(format!("photo-{}", id))],
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Opaque reference to media already stored on the platform.
///
/// Re-sending a reference forwards the same file without downloading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: String,
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn photo(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Photo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    #[serde(other)]
    Other,
}

/// Account credentials a platform session is opened with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub api_id: i64,
    pub api_hash: String,
    pub phone_number: String,
}

impl From<&crate::config::BotSettings> for Credentials {
    fn from(settings: &crate::config::BotSettings) -> Self {
        Self {
            api_id: settings.api_id,
            api_hash: settings.api_hash.clone(),
            phone_number: settings.phone_number.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_defaults_when_fields_missing() {
        let msg: RawMessage = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(msg.id, 7);
        assert_eq!(msg.text, None);
        assert!(!msg.has_media());
    }

    #[test]
    fn test_unknown_media_kind_is_other() {
        let media: MediaRef = serde_json::from_str(r#"{"id": "x", "kind": "sticker"}"#).unwrap();
        assert_eq!(media.kind, MediaKind::Other);
    }

    #[test]
    fn test_photo_builder_has_media() {
        let msg = RawMessage::photo(3).with_text("250 tl");
        assert!(msg.has_media());
        assert_eq!(msg.text.as_deref(), Some("250 tl"));
    }
}
