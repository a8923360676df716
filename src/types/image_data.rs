use std::fmt;
use std::fs;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, InputKind, Result};

/// Supported image media types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,

    #[serde(rename = "image/png")]
    Png,

    #[serde(rename = "image/gif")]
    Gif,

    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// The MIME type string sent to the provider.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
        }
    }

    /// Detect the media type from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageMediaType::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageMediaType::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageMediaType::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageMediaType::Webp)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Binary image data attached to a question.
///
/// Uploaded photos and exported canvas sketches both end up here.  The
/// bytes are kept raw and only base64-encoded at the wire boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    media_type: ImageMediaType,
    bytes: Vec<u8>,
}

impl ImageData {
    /// Wrap raw bytes, detecting the media type from their content.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::input_decode(InputKind::Image, "image is empty"));
        }
        let media_type = ImageMediaType::sniff(&bytes).ok_or_else(|| {
            Error::input_decode(
                InputKind::Image,
                "unsupported image format (expected png, jpeg, gif or webp)",
            )
        })?;
        Ok(Self { media_type, bytes })
    }

    /// Read an image from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| {
            Error::input_decode(
                InputKind::Image,
                format!("cannot read {}: {err}", path.display()),
            )
        })?;
        Self::from_bytes(bytes)
    }

    /// Decode a base64 payload, as produced by a browser canvas export.
    ///
    /// A leading `data:<mime>;base64,` prefix is accepted and ignored; the
    /// media type is always taken from the decoded bytes.
    pub fn from_base64(data: &str) -> Result<Self> {
        let payload = match data.split_once(";base64,") {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => data,
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| {
                Error::input_decode(InputKind::Image, format!("invalid base64: {err}"))
            })?;
        Self::from_bytes(bytes)
    }

    /// The detected media type.
    pub fn media_type(&self) -> ImageMediaType {
        self.media_type
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of raw bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty images are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The bytes encoded as standard base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
