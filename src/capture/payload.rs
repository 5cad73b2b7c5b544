//! Encoded media payloads and their data URL form

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// Fallback file extension when the MIME subtype says nothing useful
pub const DEFAULT_EXTENSION: &str = "webm";

#[derive(Error, Debug)]
pub enum DataUrlError {
    #[error("not a data URL")]
    MissingScheme,

    #[error("data URL has no payload separator")]
    MissingComma,

    #[error("only base64 data URLs are supported")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A finished, self-describing media blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedPayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }

    /// Parse a base64 data URL back into a payload
    pub fn from_data_url(url: &str) -> Result<Self, DataUrlError> {
        let rest = url.strip_prefix("data:").ok_or(DataUrlError::MissingScheme)?;
        // Codec parameters may contain commas, base64 never does
        let (header, data) = rest.rsplit_once(',').ok_or(DataUrlError::MissingComma)?;

        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(DataUrlError::NotBase64)?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes: BASE64_STANDARD.decode(data)?,
        })
    }

    /// File extension derived from the MIME subtype, codec parameters dropped
    pub fn extension(&self) -> &str {
        extension_for_mime(&self.mime_type)
    }
}

/// `video/webm;codecs=vp8` -> `webm`, `audio/wav` -> `wav`
pub fn extension_for_mime(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.split_once('/'))
        .map(|(_, subtype)| subtype.trim())
        .filter(|subtype| !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_shape() {
        let payload = EncodedPayload::new("audio/webm", b"abc".to_vec());
        assert_eq!(payload.to_data_url(), "data:audio/webm;base64,YWJj");
    }

    #[test]
    fn test_parse_data_url() {
        let payload = EncodedPayload::from_data_url("data:video/webm;base64,AAEC").unwrap();
        assert_eq!(payload.mime_type, "video/webm");
        assert_eq!(payload.bytes, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_keeps_codec_list() {
        let url = "data:video/webm;codecs=vp8,opus;base64,AAEC";
        let payload = EncodedPayload::from_data_url(url).unwrap();
        assert_eq!(payload.mime_type, "video/webm;codecs=vp8,opus");
        assert_eq!(payload.bytes, vec![0, 1, 2]);
        assert_eq!(payload.extension(), "webm");
        assert_eq!(payload.to_data_url(), url);
    }

    #[test]
    fn test_parse_rejects_plain_text_urls() {
        assert!(matches!(
            EncodedPayload::from_data_url("data:text/plain,hello"),
            Err(DataUrlError::NotBase64)
        ));
        assert!(matches!(
            EncodedPayload::from_data_url("https://example.com/a.webm"),
            Err(DataUrlError::MissingScheme)
        ));
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("video/webm;codecs=vp8,opus"), "webm");
        assert_eq!(extension_for_mime("audio/wav"), "wav");
        assert_eq!(extension_for_mime("application/x-weird+thing"), "webm");
        assert_eq!(extension_for_mime(""), "webm");
    }
}
