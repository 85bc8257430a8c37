//! Pure transform application: crop/resize geometry plus encode.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::{Error, Result};
use crate::transform::{Codec, CropMode, TransformSpec};

/// Apply a transform spec to a decoded image, producing encoded bytes.
///
/// Pure with respect to I/O: geometry happens here, encoding is delegated
/// to the injected codec. Region bounds are validated against the actual
/// source dimensions before any pixel work.
pub fn apply(
    image: &DynamicImage,
    spec: &TransformSpec,
    codec: &dyn Codec,
) -> Result<Vec<u8>> {
    spec.validate()?;

    let transformed = match spec.mode {
        CropMode::Fit => {
            image.resize(spec.width, spec.height, FilterType::Lanczos3)
        }
        CropMode::Fill => {
            image.resize_to_fill(spec.width, spec.height, FilterType::Lanczos3)
        }
        CropMode::Region {
            x,
            y,
            width,
            height,
        } => {
            let (src_w, src_h) = (image.width(), image.height());
            let in_bounds = x
                .checked_add(width)
                .is_some_and(|right| right <= src_w)
                && y.checked_add(height).is_some_and(|bottom| bottom <= src_h);
            if !in_bounds {
                return Err(Error::InvalidTransform(format!(
                    "region {width}x{height}+{x}+{y} exceeds source {src_w}x{src_h}"
                )));
            }
            image
                .crop_imm(x, y, width, height)
                .resize(spec.width, spec.height, FilterType::Lanczos3)
        }
    };

    codec.encode(&transformed, spec.format, spec.quality)
}
