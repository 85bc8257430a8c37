//! Asset identity, format tables, and upload metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::StoragePath;

/// Maximum accepted length for caller-supplied asset identifiers.
const MAX_ID_LEN: usize = 64;

/// Opaque, filesystem-safe identifier for an original asset.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Mint a fresh identifier (UUID v4, hyphen-free).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate a caller-supplied identifier.
    ///
    /// Identifiers are lowercase alphanumeric plus `-`/`_`, bounded in
    /// length, so they are safe to embed in file names and URLs verbatim.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.len() > MAX_ID_LEN {
            return Err(Error::Configuration(format!(
                "asset id must be 1..={MAX_ID_LEN} characters, got {}",
                raw.len()
            )));
        }
        let ok = raw
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'));
        if !ok {
            return Err(Error::Configuration(format!(
                "asset id contains unsafe characters: {raw:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssetId").field(&self.0).finish()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> String {
        id.0
    }
}

/// Image formats the store understands.
///
/// The input set (everything below) is wider than the output set: BMP and
/// TIFF are accepted on upload but variations are never encoded to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Bmp,
    Gif,
    Jpeg,
    Png,
    Tiff,
    Webp,
}

impl ImageFormat {
    /// Canonical lowercase extension, also used in canonical spec strings.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Bmp => "bmp",
            ImageFormat::Gif => "gif",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Webp => "webp",
        }
    }

    /// Whether variations may be encoded to this format.
    pub fn can_encode(&self) -> bool {
        matches!(
            self,
            ImageFormat::Gif
                | ImageFormat::Jpeg
                | ImageFormat::Png
                | ImageFormat::Webp
        )
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "bmp" => Some(ImageFormat::Bmp),
            "gif" => Some(ImageFormat::Gif),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub(crate) fn from_codec_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub(crate) fn to_codec_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::Webp => image::ImageFormat::WebP,
        }
    }

    /// Sniff the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self> {
        let guessed = image::guess_format(bytes).map_err(|err| {
            Error::UnsupportedFormat(format!("unrecognized image data: {err}"))
        })?;
        Self::from_codec_format(guessed).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "format {guessed:?} is not in the supported input set"
            ))
        })
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Metadata returned from a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: AssetId,
    pub format: ImageFormat,
    pub path: StoragePath,
    pub url: String,
    pub byte_len: u64,
    pub width: u32,
    pub height: u32,
    /// True while the asset lives in the staging tree.
    pub temporary: bool,
}
