//! Transform specifications and the pure image engine.

mod codec;
mod engine;

pub use codec::{Codec, ImageCodec};
pub use engine::apply;

use serde::{Deserialize, Serialize};

use crate::asset::ImageFormat;
use crate::error::{Error, Result};

/// Default encode quality, elided from the canonical form.
pub const DEFAULT_QUALITY: u8 = 85;

/// How the source is cropped relative to the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum CropMode {
    /// Aspect-preserving resize so the result fits inside the target box;
    /// one axis may come out smaller than requested.
    Fit,
    /// Resize and center-crop so the result is exactly the target box.
    Fill,
    /// Crop an explicit pixel rectangle from the source, then fit-resize.
    Region { x: u32, y: u32, width: u32, height: u32 },
}

/// A requested derivation of an original asset.
///
/// Two specs with identical normalized fields are equal and derive the same
/// cache key; [`TransformSpec::canonical`] is the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformSpec {
    pub width: u32,
    pub height: u32,
    pub mode: CropMode,
    pub format: ImageFormat,
    /// Encode quality in percent (1..=100). Applies to JPEG; other output
    /// encoders ignore it, but it still participates in the cache key.
    pub quality: u8,
}

impl TransformSpec {
    pub fn new(
        width: u32,
        height: u32,
        mode: CropMode,
        format: ImageFormat,
    ) -> Self {
        Self {
            width,
            height,
            mode,
            format,
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Validate everything checkable without the source image.
    ///
    /// Region bounds need the source dimensions and are checked by the
    /// engine at apply time.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidTransform(format!(
                "target dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if let CropMode::Region { width, height, .. } = self.mode {
            if width == 0 || height == 0 {
                return Err(Error::InvalidTransform(format!(
                    "region dimensions must be positive, got {width}x{height}"
                )));
            }
        }
        if !(1..=100).contains(&self.quality) {
            return Err(Error::InvalidTransform(format!(
                "quality must be 1..=100, got {}",
                self.quality
            )));
        }
        if !self.format.can_encode() {
            return Err(Error::UnsupportedFormat(format!(
                "{} is not an output format",
                self.format
            )));
        }
        Ok(())
    }

    /// Canonical serialization used for cache-key derivation.
    ///
    /// Fields appear in a fixed order and the default quality is elided, so
    /// logically identical requests collapse to one string. Must stay
    /// stable: changing it invalidates every derived key.
    pub fn canonical(&self) -> String {
        let mode = match self.mode {
            CropMode::Fit => "fit".to_string(),
            CropMode::Fill => "fill".to_string(),
            CropMode::Region {
                x,
                y,
                width,
                height,
            } => format!("region:{x},{y},{width},{height}"),
        };
        let mut canonical = format!(
            "f={};h={};m={mode}",
            self.format.extension(),
            self.height
        );
        if self.quality != DEFAULT_QUALITY {
            canonical.push_str(&format!(";q={}", self.quality));
        }
        canonical.push_str(&format!(";w={}", self.width));
        canonical
    }
}
