/// Content sniffing for blob uploads
///
/// Detection only ever looks at the plaintext payload. Formats are identified
/// by their magic bytes; payloads that look like text fall back to
/// `text/plain`, everything else is `application/octet-stream`.

/// Fallback format for unrecognised binary content
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Magic byte signatures: (offset, signature, mime type)
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xFF\xD8\xFF", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"BM", "image/bmp"),
    (0, b"II*\x00", "image/tiff"),
    (0, b"MM\x00*", "image/tiff"),
    (0, b"\x00\x00\x01\x00", "image/x-icon"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1F\x8B", "application/gzip"),
    (0, b"\x00asm", "application/wasm"),
    (0, b"\x1A\x45\xDF\xA3", "video/webm"),
    (0, b"OggS", "audio/ogg"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"fLaC", "audio/flac"),
    (4, b"ftyp", "video/mp4"),
];

/// Preferred extensions for the formats we detect, ahead of `mime_guess`
const EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/xml", "xml"),
    ("application/xml", "xml"),
    ("application/json", "json"),
    ("application/ld+json", "jsonld"),
    ("image/png", "png"),
    ("image/jpeg", "jpeg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/bmp", "bmp"),
    ("image/tiff", "tiff"),
    ("image/svg+xml", "svg"),
    ("image/x-icon", "ico"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("application/gzip", "gz"),
    ("application/wasm", "wasm"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
    ("audio/ogg", "ogg"),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("audio/flac", "flac"),
    ("application/octet-stream", "bin"),
];

/// Detect the encoding format of a payload
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.is_empty() {
        return None;
    }

    for (offset, signature, mime_type) in SIGNATURES {
        let end = offset + signature.len();
        if data.len() >= end && &data[*offset..end] == *signature {
            return Some(*mime_type);
        }
    }

    // RIFF containers carry the real type at offset 8
    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        match &data[8..12] {
            b"WEBP" => return Some("image/webp"),
            b"WAVE" => return Some("audio/wav"),
            _ => {}
        }
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if looks_like_text(text) {
            return Some(detect_text_format(text));
        }
    }

    Some(OCTET_STREAM)
}

/// Default file extension for a format
pub fn default_extension(mime_type: &str) -> Option<String> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase();

    if let Some((_, ext)) = EXTENSIONS.iter().find(|(m, _)| *m == essence) {
        return Some(ext.to_string());
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
}

fn looks_like_text(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0C'))
}

fn detect_text_format(text: &str) -> &'static str {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return "application/json";
    }

    let lower: String = trimmed.chars().take(256).collect::<String>().to_ascii_lowercase();
    if lower.starts_with("<svg") || (lower.starts_with("<?xml") && lower.contains("<svg")) {
        return "image/svg+xml";
    }
    if lower.starts_with("<?xml") {
        return "application/xml";
    }
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        return "text/html";
    }

    "text/plain"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(detect_mime_type(b"Test"), Some("text/plain"));
        assert_eq!(default_extension("text/plain").as_deref(), Some("txt"));
    }

    #[test]
    fn test_binary_signatures() {
        assert_eq!(
            detect_mime_type(b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR"),
            Some("image/png")
        );
        assert_eq!(detect_mime_type(b"%PDF-1.7\n"), Some("application/pdf"));
        assert_eq!(
            detect_mime_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some("image/webp")
        );
        assert_eq!(
            detect_mime_type(b"\x00\x00\x00\x18ftypmp42"),
            Some("video/mp4")
        );
    }

    #[test]
    fn test_structured_text() {
        assert_eq!(detect_mime_type(br#"{"a": 1}"#), Some("application/json"));
        assert_eq!(
            detect_mime_type(b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"),
            Some("image/svg+xml")
        );
        assert_eq!(
            detect_mime_type(b"<!DOCTYPE html><html></html>"),
            Some("text/html")
        );
    }

    #[test]
    fn test_unknown_binary_and_empty() {
        assert_eq!(detect_mime_type(&[0x00, 0x01, 0x02, 0xFE]), Some(OCTET_STREAM));
        assert_eq!(detect_mime_type(&[]), None);
    }

    #[test]
    fn test_extension_ignores_parameters() {
        assert_eq!(
            default_extension("text/plain; charset=utf-8").as_deref(),
            Some("txt")
        );
        assert_eq!(default_extension("IMAGE/PNG").as_deref(), Some("png"));
    }
}
