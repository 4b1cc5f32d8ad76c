use crate::platform::RawMessage;

/// Substrings marking a message as a price announcement.
pub const FEE_MARKERS: &[&str] = &["tl", "₺"];

/// Whether `text` mentions a price. Case-insensitive.
pub fn is_fee_message(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FEE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub fn has_media(message: &RawMessage) -> bool {
    message.has_media()
}

/// Whether a message closes a cluster: it has text and that text names a price.
pub fn closes_cluster(message: &RawMessage) -> bool {
    message
        .text
        .as_deref()
        .is_some_and(|text| !text.is_empty() && is_fee_message(text))
}

/// Lower-cases a caption and joins its lines, the form sent to the text generator.
pub fn normalize_caption(text: &str) -> String {
    text.to_lowercase().replace('\n', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_markers() {
        assert!(is_fee_message("fiyat 250 TL"));
        assert!(is_fee_message("250₺=7.30$"));
        assert!(is_fee_message("Fiyat: 99 Tl"));
        assert!(!is_fee_message("hello"));
        assert!(!is_fee_message(""));
    }

    #[test]
    fn test_closes_cluster_needs_text() {
        assert!(closes_cluster(&RawMessage::text(1, "300 tl")));
        assert!(closes_cluster(&RawMessage::photo(2).with_text("300₺")));
        assert!(!closes_cluster(&RawMessage::photo(3)));
        assert!(!closes_cluster(&RawMessage::text(4, "new arrivals")));
    }

    #[test]
    fn test_has_media() {
        assert!(has_media(&RawMessage::photo(1)));
        assert!(!has_media(&RawMessage::text(2, "x")));
    }

    #[test]
    fn test_normalize_caption() {
        assert_eq!(normalize_caption("  Fiyat\n250 TL \n"), "fiyat250 tl");
    }
}
