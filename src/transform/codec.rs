//! Codec seam between the engine and the backing image library.

use std::io::Cursor;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

use crate::asset::ImageFormat;
use crate::error::{Error, Result};

/// Decode/encode abstraction injected into the variation pipeline.
///
/// Keeping this a seam (rather than calling the image library directly)
/// lets tests count invocations and swap in failing doubles.
pub trait Codec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>>;
}

/// Production codec backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|err| {
            Error::UnsupportedFormat(format!("decode failed: {err}"))
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>> {
        if !format.can_encode() {
            return Err(Error::UnsupportedFormat(format!(
                "{format} is not an output format"
            )));
        }

        // Web-safe color modes per output format; encoders reject the rest.
        let image = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
            ImageFormat::Gif | ImageFormat::Webp => {
                DynamicImage::ImageRgba8(image.to_rgba8())
            }
            _ => image.clone(),
        };

        let mut buf = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                image.write_with_encoder(encoder).map_err(|err| {
                    Error::UnsupportedFormat(format!("jpeg encode failed: {err}"))
                })?;
            }
            // Quality does not apply: PNG/GIF take no quality parameter and
            // the WebP encoder here is lossless.
            other => {
                image
                    .write_to(&mut buf, other.to_codec_format())
                    .map_err(|err| {
                        Error::UnsupportedFormat(format!(
                            "{other} encode failed: {err}"
                        ))
                    })?;
            }
        }
        Ok(buf.into_inner())
    }
}
